use std::fmt;

/// See: https://github.com/kubernetes/apimachinery/blob/master/pkg/util/intstr/intstr.go
/// Holds either a port/count number or a named value ("http", "25%").
/// Serializes as the bare inner value.
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, Eq, PartialEq, Hash)]
#[serde(untagged)]
pub enum IntOrString {
    Int(i32),
    String(String),
}

impl Default for IntOrString {
    fn default() -> Self {
        IntOrString::Int(0)
    }
}

impl From<i32> for IntOrString {
    fn from(value: i32) -> Self {
        IntOrString::Int(value)
    }
}

impl From<&str> for IntOrString {
    fn from(value: &str) -> Self {
        match value.parse::<i32>() {
            Ok(number) => IntOrString::Int(number),
            Err(_) => IntOrString::String(value.to_owned()),
        }
    }
}

impl fmt::Display for IntOrString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{}", value),
            Self::String(value) => write!(f, "{}", value),
        }
    }
}

#[cfg(test)]
mod test {

    use serde_json::json;

    use crate::IntOrString;

    #[test]
    fn test_named_port() {
        let port: IntOrString = serde_json::from_value(json!("http")).expect("named port");
        assert_eq!(port, IntOrString::String("http".to_owned()));
        assert_eq!(serde_json::to_value(&port).expect("json"), json!("http"));
    }

    #[test]
    fn test_numbered_port() {
        let port: IntOrString = serde_json::from_value(json!(8080)).expect("number port");
        assert_eq!(port, IntOrString::Int(8080));
        assert_eq!(IntOrString::from("8080"), port);
    }

    #[test]
    fn test_float_rejected() {
        serde_json::from_value::<IntOrString>(json!(2.5)).expect_err("float is not a port");
    }
}
