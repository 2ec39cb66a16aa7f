//! Server configuration.
//!
//! Policies are loaded from a TOML file named by `GASMARKET_CONFIG`; when
//! the variable is unset or the file cannot be read, the built-in defaults
//! apply so a development server always boots.

use gasmarket_core::entitlement::{
    DurationUnit, Plan, PlanId, PolicyTerms, PricingPolicy, PrincipalRole,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Pricing policies to seed at boot, one per role.
    pub policies: Vec<PricingPolicy>,
}

impl ServerConfig {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns the TOML parse error verbatim.
    pub fn from_toml(document: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(document)
    }

    /// Loads configuration from `GASMARKET_CONFIG`, falling back to
    /// defaults when the variable is unset or the file is unreadable.
    #[must_use]
    pub fn load() -> Self {
        let Ok(path) = std::env::var("GASMARKET_CONFIG") else {
            return Self::default();
        };
        match std::fs::read_to_string(&path).map_err(|e| e.to_string()).and_then(|document| {
            Self::from_toml(&document).map_err(|e| e.to_string())
        }) {
            Ok(config) => config,
            Err(error) => {
                warn!(%path, %error, "failed to load config; using defaults");
                Self::default()
            }
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            policies: vec![
                PricingPolicy {
                    role: PrincipalRole::Buyer,
                    is_active: true,
                    grace_period_days: 1,
                    terms: PolicyTerms::Buyer {
                        access_price_unit: Decimal::new(500, 0),
                        access_duration_hours: 24,
                    },
                },
                PricingPolicy {
                    role: PrincipalRole::Reseller,
                    is_active: true,
                    grace_period_days: 3,
                    terms: PolicyTerms::Reseller {
                        free_trial_days: 7,
                        plans: vec![Plan {
                            id: PlanId::new("monthly").expect("static plan id is valid"),
                            name: "Monthly".to_owned(),
                            duration_value: 1,
                            duration_unit: DurationUnit::Months,
                            price: Decimal::new(5000, 0),
                            discount: None,
                            trial_days: 0,
                            auto_renew: true,
                            is_active: true,
                        }],
                    },
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_covers_both_roles() {
        let config = ServerConfig::default();
        let roles: Vec<_> = config.policies.iter().map(|p| p.role).collect();
        assert!(roles.contains(&PrincipalRole::Buyer));
        assert!(roles.contains(&PrincipalRole::Reseller));
    }

    #[test]
    fn test_config_parses_from_toml() {
        let document = r#"
            [[policies]]
            role = "buyer"
            is_active = true
            grace_period_days = 1

            [policies.terms]
            kind = "buyer"
            access_price_unit = "500"
            access_duration_hours = 24
        "#;

        let config = ServerConfig::from_toml(document).expect("should parse valid TOML");
        assert_eq!(config.policies.len(), 1);
        assert_eq!(config.policies[0].role, PrincipalRole::Buyer);
    }

    #[test]
    fn test_config_rejects_malformed_toml() {
        assert!(ServerConfig::from_toml("policies = 3").is_err());
    }
}
