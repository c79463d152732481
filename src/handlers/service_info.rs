use crate::types::{Organization, ServiceInfo, ServiceType};
use axum::Json;

pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        id: "org.example.bamtrack".to_string(),
        name: "bamtrack".to_string(),
        r#type: ServiceType {
            group: "org.example".to_string(),
            artifact: "alignment-tracks".to_string(),
            version: "1.0.0".to_string(),
        },
        description: Some("Alignment track and consensus server for genome browsers".to_string()),
        organization: Organization {
            name: "Example Organization".to_string(),
            url: "https://example.org".to_string(),
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
