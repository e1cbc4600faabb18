//! Conversions between wire DTOs and domain models.
//!
//! Reading narrows wire values (integer ports and seconds, textual IP addresses) into
//! their domain types and rejects values that do not fit with [`Error::Protocol`].
//! Writing rejects domain values the API cannot represent with
//! [`Error::InvalidArgument`], before any request is sent.

use crate::dto::{
    AddServiceRequest, CreateLoadBalancerRequest, HealthcheckDto, InstancePoolRef,
    LoadBalancerDto, LoadBalancerServiceDto, ServerStatusDto, UpdateLoadBalancerRequest,
    UpdateServiceRequest,
};
use crate::models::{
    NetworkLoadBalancer, NetworkLoadBalancerServerStatus, NetworkLoadBalancerService,
    NetworkLoadBalancerServiceHealthcheck,
};
use nimbus_core::{path_segment, Error, Result};
use std::net::IpAddr;
use std::time::Duration;

fn port_from_wire(field: &str, value: Option<i64>) -> Result<Option<u16>> {
    value
        .map(|port| {
            u16::try_from(port)
                .map_err(|_| Error::Protocol(format!("{field} {port} is not a valid port")))
        })
        .transpose()
}

fn seconds_from_wire(field: &str, value: Option<i64>) -> Result<Option<Duration>> {
    value
        .map(|secs| {
            u64::try_from(secs)
                .map(Duration::from_secs)
                .map_err(|_| Error::Protocol(format!("{field} of {secs}s is negative")))
        })
        .transpose()
}

fn ip_from_wire(field: &str, value: Option<String>) -> Result<Option<IpAddr>> {
    value
        .map(|raw| {
            raw.parse::<IpAddr>()
                .map_err(|_| Error::Protocol(format!("{field} `{raw}` is not an IP address")))
        })
        .transpose()
}

fn seconds_to_wire(field: &str, value: Option<Duration>) -> Result<Option<i64>> {
    value
        .map(|duration| {
            if duration.subsec_nanos() != 0 {
                return Err(Error::InvalidArgument(format!(
                    "{field} must be a whole number of seconds, got {duration:?}"
                )));
            }
            i64::try_from(duration.as_secs()).map_err(|_| {
                Error::InvalidArgument(format!("{field} of {duration:?} is too large"))
            })
        })
        .transpose()
}

fn require<'a, T>(value: Option<&'a T>, what: &str) -> Result<&'a T>
where
    T: ?Sized,
{
    value.ok_or_else(|| Error::InvalidArgument(format!("{what} is required")))
}

fn require_text<'a>(value: Option<&'a String>, what: &str) -> Result<&'a str> {
    match value.map(String::as_str) {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(Error::InvalidArgument(format!("{what} is required"))),
    }
}

/// ID of a load balancer, which must be set and usable as a single path segment for
/// calls addressing an existing one.
pub(crate) fn load_balancer_id(load_balancer: &NetworkLoadBalancer) -> Result<&str> {
    let id = require_text(load_balancer.id.as_ref(), "load balancer id")?;
    path_segment("load balancer id", id)
}

/// ID of a load balancer service, with the same rules as [`load_balancer_id`].
pub(crate) fn service_id(service: &NetworkLoadBalancerService) -> Result<&str> {
    let id = require_text(service.id.as_ref(), "load balancer service id")?;
    path_segment("load balancer service id", id)
}

impl TryFrom<LoadBalancerDto> for NetworkLoadBalancer {
    type Error = Error;

    fn try_from(dto: LoadBalancerDto) -> Result<Self> {
        let services = dto
            .services
            .unwrap_or_default()
            .into_iter()
            .map(NetworkLoadBalancerService::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: dto.id,
            name: dto.name,
            description: dto.description,
            created_at: dto.created_at,
            ip_address: ip_from_wire("load balancer ip", dto.ip)?,
            labels: dto.labels,
            services,
            state: dto.state,
        })
    }
}

impl TryFrom<LoadBalancerServiceDto> for NetworkLoadBalancerService {
    type Error = Error;

    fn try_from(dto: LoadBalancerServiceDto) -> Result<Self> {
        let healthcheck_status = dto
            .healthcheck_status
            .unwrap_or_default()
            .into_iter()
            .map(NetworkLoadBalancerServerStatus::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: dto.id,
            name: dto.name,
            description: dto.description,
            instance_pool_id: dto.instance_pool.and_then(|pool| pool.id),
            port: port_from_wire("service port", dto.port)?,
            target_port: port_from_wire("service target-port", dto.target_port)?,
            protocol: dto.protocol,
            strategy: dto.strategy,
            state: dto.state,
            healthcheck: dto
                .healthcheck
                .map(NetworkLoadBalancerServiceHealthcheck::try_from)
                .transpose()?,
            healthcheck_status,
        })
    }
}

impl TryFrom<HealthcheckDto> for NetworkLoadBalancerServiceHealthcheck {
    type Error = Error;

    fn try_from(dto: HealthcheckDto) -> Result<Self> {
        Ok(Self {
            mode: dto.mode,
            port: port_from_wire("healthcheck port", dto.port)?,
            interval: seconds_from_wire("healthcheck interval", dto.interval)?,
            timeout: seconds_from_wire("healthcheck timeout", dto.timeout)?,
            retries: dto.retries,
            uri: dto.uri,
            tls_sni: dto.tls_sni,
        })
    }
}

impl TryFrom<ServerStatusDto> for NetworkLoadBalancerServerStatus {
    type Error = Error;

    fn try_from(dto: ServerStatusDto) -> Result<Self> {
        Ok(Self {
            instance_ip: ip_from_wire("healthcheck status public-ip", dto.public_ip)?,
            status: dto.status,
        })
    }
}

impl TryFrom<&NetworkLoadBalancerServiceHealthcheck> for HealthcheckDto {
    type Error = Error;

    fn try_from(healthcheck: &NetworkLoadBalancerServiceHealthcheck) -> Result<Self> {
        Ok(Self {
            mode: healthcheck.mode.clone(),
            port: healthcheck.port.map(i64::from),
            interval: seconds_to_wire("healthcheck interval", healthcheck.interval)?,
            timeout: seconds_to_wire("healthcheck timeout", healthcheck.timeout)?,
            retries: healthcheck.retries,
            uri: healthcheck.uri.clone(),
            tls_sni: healthcheck.tls_sni.clone(),
        })
    }
}

impl From<&NetworkLoadBalancerServerStatus> for ServerStatusDto {
    fn from(status: &NetworkLoadBalancerServerStatus) -> Self {
        Self {
            public_ip: status.instance_ip.map(|ip| ip.to_string()),
            status: status.status.clone(),
        }
    }
}

impl TryFrom<&NetworkLoadBalancerService> for LoadBalancerServiceDto {
    type Error = Error;

    fn try_from(service: &NetworkLoadBalancerService) -> Result<Self> {
        Ok(Self {
            id: service.id.clone(),
            name: service.name.clone(),
            description: service.description.clone(),
            instance_pool: service.instance_pool_id.clone().map(|id| InstancePoolRef {
                id: Some(id),
            }),
            port: service.port.map(i64::from),
            target_port: service.target_port.map(i64::from),
            protocol: service.protocol.clone(),
            strategy: service.strategy.clone(),
            state: service.state.clone(),
            healthcheck: service
                .healthcheck
                .as_ref()
                .map(HealthcheckDto::try_from)
                .transpose()?,
            healthcheck_status: Some(
                service
                    .healthcheck_status
                    .iter()
                    .map(ServerStatusDto::from)
                    .collect(),
            ),
        })
    }
}

impl TryFrom<&NetworkLoadBalancer> for LoadBalancerDto {
    type Error = Error;

    fn try_from(load_balancer: &NetworkLoadBalancer) -> Result<Self> {
        let services = load_balancer
            .services
            .iter()
            .map(LoadBalancerServiceDto::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: load_balancer.id.clone(),
            name: load_balancer.name.clone(),
            description: load_balancer.description.clone(),
            created_at: load_balancer.created_at,
            ip: load_balancer.ip_address.map(|ip| ip.to_string()),
            labels: load_balancer.labels.clone(),
            services: Some(services),
            state: load_balancer.state.clone(),
        })
    }
}

/// Build the creation request for a load balancer. The name is required.
pub(crate) fn create_load_balancer_request(
    load_balancer: &NetworkLoadBalancer,
) -> Result<CreateLoadBalancerRequest> {
    let name = require_text(load_balancer.name.as_ref(), "load balancer name")?;

    Ok(CreateLoadBalancerRequest {
        name: name.to_string(),
        description: load_balancer.description.clone(),
        labels: load_balancer.labels.clone(),
    })
}

pub(crate) fn update_load_balancer_request(
    load_balancer: &NetworkLoadBalancer,
) -> UpdateLoadBalancerRequest {
    UpdateLoadBalancerRequest {
        name: load_balancer.name.clone(),
        description: load_balancer.description.clone(),
        labels: load_balancer.labels.clone(),
    }
}

/// Build the request adding a service to a load balancer.
///
/// Name, instance pool, ports, protocol, strategy and healthcheck are required by
/// the API; a missing one is reported without contacting the server.
pub(crate) fn add_service_request(service: &NetworkLoadBalancerService) -> Result<AddServiceRequest> {
    let name = require_text(service.name.as_ref(), "service name")?;
    let instance_pool_id = require_text(service.instance_pool_id.as_ref(), "service instance pool id")?;
    let port = require(service.port.as_ref(), "service port")?;
    let target_port = require(service.target_port.as_ref(), "service target port")?;
    let protocol = require(service.protocol.as_ref(), "service protocol")?;
    let strategy = require(service.strategy.as_ref(), "service strategy")?;
    let healthcheck = require(service.healthcheck.as_ref(), "service healthcheck")?;

    Ok(AddServiceRequest {
        name: name.to_string(),
        description: service.description.clone(),
        healthcheck: HealthcheckDto::try_from(healthcheck)?,
        instance_pool: InstancePoolRef {
            id: Some(instance_pool_id.to_string()),
        },
        port: i64::from(*port),
        protocol: protocol.clone(),
        strategy: strategy.clone(),
        target_port: i64::from(*target_port),
    })
}

pub(crate) fn update_service_request(
    service: &NetworkLoadBalancerService,
) -> Result<UpdateServiceRequest> {
    Ok(UpdateServiceRequest {
        name: service.name.clone(),
        description: service.description.clone(),
        port: service.port.map(i64::from),
        target_port: service.target_port.map(i64::from),
        protocol: service.protocol.clone(),
        strategy: service.strategy.clone(),
        healthcheck: service
            .healthcheck
            .as_ref()
            .map(HealthcheckDto::try_from)
            .transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        HealthcheckMode, LoadBalancerState, ServerStatus, ServiceProtocol, ServiceStrategy,
    };
    use serde_json::json;

    fn service_dto() -> LoadBalancerServiceDto {
        serde_json::from_value(json!({
            "id": "svc-1",
            "name": "https",
            "description": "TLS passthrough",
            "instance-pool": {"id": "pool-1"},
            "port": 443,
            "target-port": 8443,
            "protocol": "tcp",
            "strategy": "round-robin",
            "state": "running",
            "healthcheck": {
                "mode": "https",
                "port": 8080,
                "interval": 10,
                "timeout": 3,
                "retries": 1,
                "uri": "/health",
                "tls-sni": "example.net"
            },
            "healthcheck-status": [
                {"public-ip": "1.2.3.4", "status": "success"},
                {"public-ip": "5.6.7.8", "status": "failure"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn service_from_wire() {
        let service = NetworkLoadBalancerService::try_from(service_dto()).unwrap();

        assert_eq!(service.instance_pool_id.as_deref(), Some("pool-1"));
        assert_eq!(service.port, Some(443));
        assert_eq!(service.target_port, Some(8443));
        assert_eq!(service.protocol, Some(ServiceProtocol::Tcp));
        assert_eq!(service.strategy, Some(ServiceStrategy::RoundRobin));

        let healthcheck = service.healthcheck.unwrap();
        assert_eq!(healthcheck.mode, Some(HealthcheckMode::Https));
        assert_eq!(healthcheck.port, Some(8080));
        assert_eq!(healthcheck.interval, Some(Duration::from_secs(10)));
        assert_eq!(healthcheck.timeout, Some(Duration::from_secs(3)));
        assert_eq!(healthcheck.retries, Some(1));

        assert_eq!(service.healthcheck_status.len(), 2);
        assert_eq!(
            service.healthcheck_status[0].instance_ip,
            Some("1.2.3.4".parse().unwrap())
        );
        assert_eq!(
            service.healthcheck_status[1].status,
            Some(ServerStatus::Failure)
        );
    }

    #[test]
    fn absent_fields_stay_unset() {
        let load_balancer = NetworkLoadBalancer::try_from(LoadBalancerDto {
            id: Some("lb-1".into()),
            ..LoadBalancerDto::default()
        })
        .unwrap();

        assert_eq!(load_balancer.id.as_deref(), Some("lb-1"));
        assert!(load_balancer.name.is_none());
        assert!(load_balancer.ip_address.is_none());
        assert!(load_balancer.labels.is_none());
        assert!(load_balancer.state.is_none());
        assert!(load_balancer.services.is_empty());

        let service = NetworkLoadBalancerService::try_from(LoadBalancerServiceDto::default()).unwrap();
        assert!(service.healthcheck.is_none());
        assert!(service.healthcheck_status.is_empty());
    }

    #[test]
    fn unknown_state_passes_through() {
        let load_balancer = NetworkLoadBalancer::try_from(LoadBalancerDto {
            state: Some("hibernating".into()),
            ..LoadBalancerDto::default()
        })
        .unwrap();
        assert_eq!(
            load_balancer.state,
            Some(LoadBalancerState::Unknown("hibernating".into()))
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut dto = service_dto();
        dto.target_port = Some(70_000);
        let err = NetworkLoadBalancerService::try_from(dto).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));

        let mut dto = service_dto();
        if let Some(healthcheck) = dto.healthcheck.as_mut() {
            healthcheck.interval = Some(-1);
        }
        let err = NetworkLoadBalancerService::try_from(dto).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));

        let err = NetworkLoadBalancer::try_from(LoadBalancerDto {
            ip: Some("not-an-ip".into()),
            ..LoadBalancerDto::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn service_round_trip() {
        let dto = service_dto();
        let service = NetworkLoadBalancerService::try_from(dto.clone()).unwrap();
        assert_eq!(LoadBalancerServiceDto::try_from(&service).unwrap(), dto);
    }

    #[test]
    fn empty_collections_round_trip() {
        let dto: LoadBalancerDto = serde_json::from_value(json!({
            "id": "lb-1",
            "services": []
        }))
        .unwrap();
        let load_balancer = NetworkLoadBalancer::try_from(dto.clone()).unwrap();
        let back = LoadBalancerDto::try_from(&load_balancer).unwrap();
        assert_eq!(back, dto);
        assert_eq!(
            serde_json::to_value(&back).unwrap(),
            json!({"id": "lb-1", "services": []})
        );

        let mut dto = service_dto();
        dto.healthcheck_status = Some(Vec::new());
        let service = NetworkLoadBalancerService::try_from(dto.clone()).unwrap();
        let back = LoadBalancerServiceDto::try_from(&service).unwrap();
        assert_eq!(back.healthcheck_status, Some(Vec::new()));
        assert_eq!(back, dto);
    }

    #[test]
    fn sub_second_duration_is_rejected_on_write() {
        let healthcheck = NetworkLoadBalancerServiceHealthcheck {
            interval: Some(Duration::from_millis(1500)),
            ..NetworkLoadBalancerServiceHealthcheck::default()
        };
        let err = HealthcheckDto::try_from(&healthcheck).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn create_request_requires_name() {
        let err = create_load_balancer_request(&NetworkLoadBalancer::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let request =
            create_load_balancer_request(&NetworkLoadBalancer::new("testdb").description("d"))
                .unwrap();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"name": "testdb", "description": "d"})
        );
    }

    #[test]
    fn add_service_request_requires_fields() {
        let service = NetworkLoadBalancerService::try_from(service_dto()).unwrap();
        let request = add_service_request(&service).unwrap();
        assert_eq!(request.instance_pool.id.as_deref(), Some("pool-1"));
        assert_eq!(request.port, 443);
        assert_eq!(request.target_port, 8443);

        let incomplete = NetworkLoadBalancerService {
            port: None,
            ..service
        };
        let err = add_service_request(&incomplete).unwrap_err();
        assert_eq!(err.to_string(), "Invalid argument: service port is required");
    }

    #[test]
    fn update_service_request_sends_present_empty_values() {
        let service = NetworkLoadBalancerService {
            id: Some("svc-1".into()),
            healthcheck: Some(NetworkLoadBalancerServiceHealthcheck {
                mode: Some(HealthcheckMode::Http),
                uri: Some(String::new()),
                tls_sni: Some(String::new()),
                ..NetworkLoadBalancerServiceHealthcheck::default()
            }),
            ..NetworkLoadBalancerService::default()
        };

        let request = update_service_request(&service).unwrap();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"healthcheck": {"mode": "http", "uri": "", "tls-sni": ""}})
        );
    }

    #[test]
    fn identifiers_must_be_present() {
        assert!(load_balancer_id(&NetworkLoadBalancer::new("web")).is_err());
        assert!(load_balancer_id(&NetworkLoadBalancer::with_id("")).is_err());
        assert_eq!(
            load_balancer_id(&NetworkLoadBalancer::with_id("lb-1")).unwrap(),
            "lb-1"
        );
        assert!(service_id(&NetworkLoadBalancerService::default()).is_err());
    }

    #[test]
    fn identifiers_must_be_single_path_segments() {
        for id in ["..", "../operation/victim", "lb-1/service", "lb-1?force=true", "lb#1"] {
            let err = load_balancer_id(&NetworkLoadBalancer::with_id(id)).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{id}");

            let service = NetworkLoadBalancerService {
                id: Some(id.to_string()),
                ..NetworkLoadBalancerService::default()
            };
            let err = service_id(&service).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{id}");
        }
    }
}
