use std::collections::HashMap;

use k8_types::networking::ingress::IngressSpec;

use crate::api::DeployVersion;

/// Ingress that routes a share of traffic to one version
#[derive(Debug, Clone, PartialEq)]
pub struct CanaryIngress {
    pub name: String,
    pub annotations: HashMap<String, String>,
    pub spec: IngressSpec,
}

/// Build canary ingress for `version`, none if the version has no canary.
///
/// Its ingress spec is a copy of the primary one with every http backend pointing at
/// `primary_service` moved to the version service. Generated ingress name is
/// stored back on the canary.
pub fn make_canary_ingress(
    ms_name: &str,
    primary: &IngressSpec,
    primary_service: Option<&str>,
    version: &mut DeployVersion,
) -> Option<CanaryIngress> {
    let version_service = version.service_name_or_default(ms_name);
    let version_name = version.name.clone();
    let canary = version.canary.as_mut()?;

    let name = canary.ingress_name_or_default(ms_name, &version_name);
    canary.canary_ingress_name = Some(name.clone());

    let mut spec = primary.clone();
    if let Some(primary_service) = primary_service {
        for backend in spec.http_backends_mut() {
            if backend.service_name == primary_service {
                backend.service_name = version_service.clone();
            }
        }
    }

    Some(CanaryIngress {
        name,
        annotations: canary.annotations(),
        spec,
    })
}
