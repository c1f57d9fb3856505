//! Handler-id prop conventions
//!
//! Function-valued props cannot cross the plugin–host boundary.
//! The plugin registers the callback locally and ships an opaque
//! handler id in its place, under a renamed prop:
//! `onClick` becomes `_onClickHandlerId`. The host recognizes these
//! props and routes interactions back through `executeHandler`.

/// Opaque token naming a registered callback. Format `handler_<n>`;
/// ids are never reused within a session.
pub type HandlerId = String;

const HANDLER_PROP_PREFIX: &str = "_";
const HANDLER_PROP_SUFFIX: &str = "HandlerId";

/// Event props follow the `on` + uppercase convention: `onClick`,
/// `onKeyDown`. `once` or `online` are not event props.
pub fn is_event_prop(key: &str) -> bool {
    key.len() > 2
        && key.starts_with("on")
        && key[2..].chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// Prop name carrying the handler id for an event prop:
/// `onClick` -> `_onClickHandlerId`.
pub fn handler_id_prop(event_prop: &str) -> String {
    format!("{HANDLER_PROP_PREFIX}{event_prop}{HANDLER_PROP_SUFFIX}")
}

/// Check whether a prop name is a handler-id prop.
pub fn is_handler_id_prop(prop: &str) -> bool {
    prop.len() > HANDLER_PROP_PREFIX.len() + HANDLER_PROP_SUFFIX.len()
        && prop.starts_with(HANDLER_PROP_PREFIX)
        && prop.ends_with(HANDLER_PROP_SUFFIX)
}

/// Extract the event name from a handler-id prop:
/// `_onClickHandlerId` -> `onClick`. Returns `None` if the prop does
/// not follow the convention.
pub fn extract_event_name(prop: &str) -> Option<&str> {
    if !is_handler_id_prop(prop) {
        return None;
    }
    let inner = &prop[HANDLER_PROP_PREFIX.len()..prop.len() - HANDLER_PROP_SUFFIX.len()];
    is_event_prop(inner).then_some(inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_prop_heuristic() {
        assert!(is_event_prop("onClick"));
        assert!(is_event_prop("onKeyDown"));
        assert!(!is_event_prop("on"));
        assert!(!is_event_prop("once"));
        assert!(!is_event_prop("label"));
    }

    #[test]
    fn test_handler_prop_round_trip() {
        let prop = handler_id_prop("onClick");
        assert_eq!(prop, "_onClickHandlerId");
        assert!(is_handler_id_prop(&prop));
        assert_eq!(extract_event_name(&prop), Some("onClick"));
    }

    #[test]
    fn test_extract_rejects_non_event_inner() {
        assert_eq!(extract_event_name("_labelHandlerId"), None);
        assert_eq!(extract_event_name("onClick"), None);
    }
}
