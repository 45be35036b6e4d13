use homie_core::Domain;

/// Network domain and catalog search intent a workflow sends on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DomainProfile {
    pub network_domain: &'static str,
    pub search_intent: &'static str,
}

impl DomainProfile {
    pub fn for_domain(domain: Domain) -> Self {
        match domain {
            Domain::Connection => Self { network_domain: "deg:service", search_intent: "Connection" },
            Domain::SolarRetail => Self { network_domain: "deg:retail", search_intent: "solar" },
            Domain::SolarService => Self { network_domain: "deg:service", search_intent: "resi" },
            Domain::Subsidy => Self { network_domain: "deg:schemes", search_intent: "incentive" },
        }
    }
}
