use std::collections::HashMap;

use serde::Serialize;
use tracing::trace;

use k8_diff::Changes;
use k8_diff::DiffError;

/// used for comparing k8 objects: only the parts a controller writes
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DiffableK8Obj<'a, S> {
    #[serde(skip_serializing_if = "Option::is_none")]
    annotations: Option<&'a HashMap<String, String>>,
    spec: &'a S,
}

impl<'a, S> DiffableK8Obj<'a, S>
where
    S: Serialize,
{
    pub fn new(spec: &'a S) -> Self {
        Self {
            annotations: None,
            spec,
        }
    }

    pub fn with_annotations(mut self, annotations: &'a HashMap<String, String>) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// deep comparison through json representation
    pub fn is_same_as<E>(&self, other: &Self) -> Result<bool, E>
    where
        E: From<serde_json::Error> + From<DiffError>,
    {
        let current = serde_json::to_value(self)?;
        let desired = serde_json::to_value(other)?;
        let diff = current.diff(&desired)?;
        if let Some(patch) = diff.as_patch_ref() {
            let merge_patch = serde_json::to_string(patch)?;
            trace!(fields = ?patch.changed_fields().collect::<Vec<_>>(), %merge_patch, "detected diff");
        }
        Ok(diff.is_none())
    }
}

#[cfg(test)]
mod test {

    use std::collections::HashMap;

    use k8_diff::DiffError;
    use k8_types::core::service::ServicePort;
    use k8_types::core::service::ServiceSpec;

    use super::DiffableK8Obj;

    #[derive(Debug)]
    enum TestError {
        Diff,
        Json,
    }

    impl From<DiffError> for TestError {
        fn from(_: DiffError) -> Self {
            Self::Diff
        }
    }

    impl From<serde_json::Error> for TestError {
        fn from(_: serde_json::Error) -> Self {
            Self::Json
        }
    }

    fn service(port: u16) -> ServiceSpec {
        ServiceSpec {
            ports: vec![ServicePort {
                port,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_same_spec() {
        let found = service(80);
        let desired = service(80);
        assert!(DiffableK8Obj::new(&found)
            .is_same_as::<TestError>(&DiffableK8Obj::new(&desired))
            .expect("compare"));
    }

    #[test]
    fn test_annotations_are_compared() {
        let spec = service(80);
        let mut canary = HashMap::new();
        canary.insert("nginx.ingress.kubernetes.io/canary".to_owned(), "true".to_owned());
        let plain = HashMap::new();

        let found = DiffableK8Obj::new(&spec).with_annotations(&plain);
        let desired = DiffableK8Obj::new(&spec).with_annotations(&canary);
        assert!(!found.is_same_as::<TestError>(&desired).expect("compare"));
    }

    #[test]
    fn test_port_change() {
        let found = service(80);
        let desired = service(8080);
        assert!(!DiffableK8Obj::new(&found)
            .is_same_as::<TestError>(&DiffableK8Obj::new(&desired))
            .expect("compare"));
    }
}
