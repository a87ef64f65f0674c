
#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use crate::event::{global_name, is_stop};

    #[test]
    fn test_only_false_stops() {
        assert!(is_stop(&Value::Bool(false)));
        assert!(!is_stop(&Value::Bool(true)));
        assert!(!is_stop(&Value::Null));
        assert!(!is_stop(&json!(0)));
        assert!(!is_stop(&json!("false")));
    }

    #[test]
    fn test_global_name() {
        assert_eq!(global_name("uploader", "done"), "uploader.done");
    }
}
