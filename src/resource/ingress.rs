//! Conversion from Kubernetes Ingress objects.

use k8s_openapi::api::networking::v1::{HTTPIngressPath, Ingress};

use super::{HostRule, PathRule, RuleObject};

impl From<&Ingress> for RuleObject {
    fn from(ingress: &Ingress) -> Self {
        let spec = ingress.spec.as_ref();

        let rules = spec
            .and_then(|s| s.rules.as_ref())
            .map(|rules| {
                rules
                    .iter()
                    .map(|rule| HostRule {
                        host: rule.host.clone().unwrap_or_default(),
                        paths: rule
                            .http
                            .as_ref()
                            .map(|http| http.paths.iter().filter_map(path_rule).collect())
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            namespace: ingress.metadata.namespace.clone().unwrap_or_default(),
            name: ingress.metadata.name.clone().unwrap_or_default(),
            class_name: spec.and_then(|s| s.ingress_class_name.clone()),
            rules,
        }
    }
}

/// Only service backends with a numeric port are routable.
fn path_rule(path: &HTTPIngressPath) -> Option<PathRule> {
    let service = path.backend.service.as_ref()?;
    let number = service.port.as_ref()?.number?;
    let port = match u16::try_from(number) {
        Ok(port) => port,
        Err(_) => {
            tracing::warn!(service = %service.name, port = number, "Ignoring out-of-range service port");
            return None;
        }
    };

    Some(PathRule {
        path: path.path.clone().unwrap_or_default(),
        service_name: service.name.clone(),
        service_port: port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::networking::v1::{
        HTTPIngressRuleValue, IngressBackend, IngressRule, IngressServiceBackend, IngressSpec,
        ServiceBackendPort,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn backend(name: &str, number: Option<i32>, port_name: Option<&str>) -> IngressBackend {
        IngressBackend {
            service: Some(IngressServiceBackend {
                name: name.to_string(),
                port: Some(ServiceBackendPort {
                    name: port_name.map(str::to_string),
                    number,
                }),
            }),
            ..Default::default()
        }
    }

    fn path(p: &str, backend: IngressBackend) -> HTTPIngressPath {
        HTTPIngressPath {
            path: Some(p.to_string()),
            path_type: "Exact".to_string(),
            backend,
        }
    }

    #[test]
    fn test_convert_ingress() {
        let ingress = Ingress {
            metadata: ObjectMeta {
                name: Some("web".into()),
                namespace: Some("default".into()),
                ..Default::default()
            },
            spec: Some(IngressSpec {
                ingress_class_name: Some("d3os".into()),
                rules: Some(vec![
                    IngressRule {
                        host: Some("example.com".into()),
                        http: Some(HTTPIngressRuleValue {
                            paths: vec![
                                path("/app", backend("backend1", Some(8080), None)),
                                path("/named", backend("backend2", None, Some("http"))),
                            ],
                        }),
                    },
                    IngressRule {
                        host: None,
                        http: None,
                    },
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let obj = RuleObject::from(&ingress);
        assert_eq!(obj.namespace, "default");
        assert_eq!(obj.name, "web");
        assert_eq!(obj.class_name.as_deref(), Some("d3os"));
        assert_eq!(obj.rules.len(), 2);
        assert_eq!(
            obj.rules[0].paths,
            vec![PathRule {
                path: "/app".into(),
                service_name: "backend1".into(),
                service_port: 8080,
            }]
        );
        assert_eq!(obj.rules[1].host, "");
        assert!(obj.rules[1].paths.is_empty());
    }

    #[test]
    fn test_convert_ingress_without_spec() {
        let ingress = Ingress {
            metadata: ObjectMeta {
                name: Some("bare".into()),
                namespace: Some("ops".into()),
                ..Default::default()
            },
            ..Default::default()
        };

        let obj = RuleObject::from(&ingress);
        assert_eq!(obj.key().to_string(), "ops/bare");
        assert!(obj.class_name.is_none());
        assert!(obj.rules.is_empty());
    }
}
