//! Factory system — converts policy configs into runtime trait objects.
//!
//! Policy selection is data: a tagged enum deserialized from configuration.
//! Unknown `type` tags fail at deserialization; out-of-range parameters fail
//! here, before any simulation starts. The simulator only ever sees
//! `Box<dyn ExitPolicy>` / `Box<dyn PositionSizer>`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::exit::{
    CompositeExit, DynamicExit, DynamicKey, ExitPolicy, FixedExit, RegimeGuardExit,
    SignalOnlyExit, TargetPair, TimeoutExit, TrailingExit,
};
use crate::sizing::{
    ConfidenceSizer, FixedFractionSizer, KellySizer, PositionSizer, TierSizer,
};

// ─── Error type ──────────────────────────────────────────────────────

/// Errors that can occur during policy construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FactoryError {
    #[error("{policy}: parameter '{name}' = {value} is out of range ({expected})")]
    InvalidParameter {
        policy: &'static str,
        name: &'static str,
        value: f64,
        expected: &'static str,
    },
    #[error("{policy}: {message}")]
    Invalid {
        policy: &'static str,
        message: String,
    },
}

// ─── Config types ────────────────────────────────────────────────────

/// Exit policy selection, e.g. `{ type = "FIXED", params = { take_profit_pct = 0.1 } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitPolicyConfig {
    SignalOnly,
    Fixed {
        #[serde(default)]
        take_profit_pct: Option<f64>,
        #[serde(default)]
        stop_loss_pct: Option<f64>,
    },
    Dynamic {
        #[serde(default)]
        key: DynamicKey,
        #[serde(default)]
        targets: BTreeMap<String, TargetPair>,
        default: TargetPair,
    },
    Trailing {
        trail_pct: f64,
        #[serde(default)]
        activation_pct: Option<f64>,
        #[serde(default)]
        initial_stop_pct: Option<f64>,
    },
    Timeout {
        hours: u32,
    },
    RegimeGuard {
        adverse_states: Vec<String>,
        #[serde(default = "default_true")]
        on_change_only: bool,
    },
    Composite {
        policies: Vec<ExitPolicyConfig>,
    },
}

fn default_true() -> bool {
    true
}

impl Default for ExitPolicyConfig {
    fn default() -> Self {
        ExitPolicyConfig::SignalOnly
    }
}

impl ExitPolicyConfig {
    pub fn type_name(&self) -> &'static str {
        match self {
            ExitPolicyConfig::SignalOnly => "SIGNAL_ONLY",
            ExitPolicyConfig::Fixed { .. } => "FIXED",
            ExitPolicyConfig::Dynamic { .. } => "DYNAMIC",
            ExitPolicyConfig::Trailing { .. } => "TRAILING",
            ExitPolicyConfig::Timeout { .. } => "TIMEOUT",
            ExitPolicyConfig::RegimeGuard { .. } => "REGIME_GUARD",
            ExitPolicyConfig::Composite { .. } => "COMPOSITE",
        }
    }

    /// Same policy with its holding horizon forced to `hours`.
    ///
    /// An existing timeout (at any depth of a composite) is replaced; otherwise
    /// a timeout is appended after the configured policy.
    pub fn with_timeout(&self, hours: u32) -> ExitPolicyConfig {
        fn replace(config: &ExitPolicyConfig, hours: u32) -> (ExitPolicyConfig, bool) {
            match config {
                ExitPolicyConfig::Timeout { .. } => (ExitPolicyConfig::Timeout { hours }, true),
                ExitPolicyConfig::Composite { policies } => {
                    let mut found = false;
                    let policies = policies
                        .iter()
                        .map(|p| {
                            let (p, f) = replace(p, hours);
                            found |= f;
                            p
                        })
                        .collect();
                    (ExitPolicyConfig::Composite { policies }, found)
                }
                other => (other.clone(), false),
            }
        }

        match replace(self, hours) {
            (replaced, true) => replaced,
            (ExitPolicyConfig::SignalOnly, false) => ExitPolicyConfig::Timeout { hours },
            (ExitPolicyConfig::Composite { mut policies }, false) => {
                policies.push(ExitPolicyConfig::Timeout { hours });
                ExitPolicyConfig::Composite { policies }
            }
            (other, false) => ExitPolicyConfig::Composite {
                policies: vec![other, ExitPolicyConfig::Timeout { hours }],
            },
        }
    }

    pub fn validate(&self) -> Result<(), FactoryError> {
        match self {
            ExitPolicyConfig::SignalOnly => Ok(()),
            ExitPolicyConfig::Fixed {
                take_profit_pct,
                stop_loss_pct,
            } => {
                check_opt_positive("FIXED", "take_profit_pct", *take_profit_pct)?;
                check_opt_fraction("FIXED", "stop_loss_pct", *stop_loss_pct)
            }
            ExitPolicyConfig::Dynamic {
                targets, default, ..
            } => {
                for pair in targets.values().chain(std::iter::once(default)) {
                    check_opt_positive("DYNAMIC", "take_profit_pct", pair.take_profit_pct)?;
                    check_opt_fraction("DYNAMIC", "stop_loss_pct", pair.stop_loss_pct)?;
                }
                Ok(())
            }
            ExitPolicyConfig::Trailing {
                trail_pct,
                activation_pct,
                initial_stop_pct,
            } => {
                check_fraction("TRAILING", "trail_pct", *trail_pct)?;
                check_opt_positive("TRAILING", "activation_pct", *activation_pct)?;
                check_opt_fraction("TRAILING", "initial_stop_pct", *initial_stop_pct)
            }
            ExitPolicyConfig::Timeout { hours } => {
                if *hours == 0 {
                    return Err(FactoryError::InvalidParameter {
                        policy: "TIMEOUT",
                        name: "hours",
                        value: 0.0,
                        expected: "> 0",
                    });
                }
                Ok(())
            }
            ExitPolicyConfig::RegimeGuard { adverse_states, .. } => {
                if adverse_states.is_empty() {
                    return Err(FactoryError::Invalid {
                        policy: "REGIME_GUARD",
                        message: "adverse_states must not be empty".into(),
                    });
                }
                Ok(())
            }
            ExitPolicyConfig::Composite { policies } => {
                if policies.is_empty() {
                    return Err(FactoryError::Invalid {
                        policy: "COMPOSITE",
                        message: "policies must not be empty".into(),
                    });
                }
                policies.iter().try_for_each(ExitPolicyConfig::validate)
            }
        }
    }
}

/// Position sizing selection, e.g. `{ type = "KELLY", params = { multiplier = 0.5 } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizingPolicyConfig {
    Fixed {
        fraction: f64,
    },
    Kelly {
        #[serde(default = "kelly_window")]
        window: usize,
        #[serde(default = "kelly_min_trades")]
        min_trades: usize,
        #[serde(default = "kelly_multiplier")]
        multiplier: f64,
        #[serde(default = "kelly_ceiling")]
        ceiling: f64,
        #[serde(default = "kelly_fallback")]
        fallback: f64,
    },
    Confidence {
        floor: f64,
        ceiling: f64,
    },
    Tier {
        #[serde(default = "tier_key")]
        key: String,
        tiers: BTreeMap<String, f64>,
        default: f64,
    },
}

fn kelly_window() -> usize {
    KellySizer::default().window
}
fn kelly_min_trades() -> usize {
    KellySizer::default().min_trades
}
fn kelly_multiplier() -> f64 {
    KellySizer::default().multiplier
}
fn kelly_ceiling() -> f64 {
    KellySizer::default().ceiling
}
fn kelly_fallback() -> f64 {
    KellySizer::default().fallback
}
fn tier_key() -> String {
    "market_state".to_string()
}

impl Default for SizingPolicyConfig {
    fn default() -> Self {
        SizingPolicyConfig::Fixed { fraction: 1.0 }
    }
}

impl SizingPolicyConfig {
    pub fn type_name(&self) -> &'static str {
        match self {
            SizingPolicyConfig::Fixed { .. } => "FIXED",
            SizingPolicyConfig::Kelly { .. } => "KELLY",
            SizingPolicyConfig::Confidence { .. } => "CONFIDENCE",
            SizingPolicyConfig::Tier { .. } => "TIER",
        }
    }

    pub fn validate(&self) -> Result<(), FactoryError> {
        match self {
            SizingPolicyConfig::Fixed { fraction } => check_unit("FIXED", "fraction", *fraction),
            SizingPolicyConfig::Kelly {
                window,
                min_trades,
                multiplier,
                ceiling,
                fallback,
            } => {
                if *window == 0 || min_trades > window {
                    return Err(FactoryError::Invalid {
                        policy: "KELLY",
                        message: format!(
                            "window ({window}) must be > 0 and >= min_trades ({min_trades})"
                        ),
                    });
                }
                if !multiplier.is_finite() || *multiplier <= 0.0 {
                    return Err(FactoryError::InvalidParameter {
                        policy: "KELLY",
                        name: "multiplier",
                        value: *multiplier,
                        expected: "> 0",
                    });
                }
                check_unit("KELLY", "ceiling", *ceiling)?;
                check_unit("KELLY", "fallback", *fallback)
            }
            SizingPolicyConfig::Confidence { floor, ceiling } => {
                check_unit("CONFIDENCE", "floor", *floor)?;
                check_unit("CONFIDENCE", "ceiling", *ceiling)?;
                if floor > ceiling {
                    return Err(FactoryError::Invalid {
                        policy: "CONFIDENCE",
                        message: format!("floor ({floor}) exceeds ceiling ({ceiling})"),
                    });
                }
                Ok(())
            }
            SizingPolicyConfig::Tier { tiers, default, .. } => {
                check_unit("TIER", "default", *default)?;
                tiers
                    .values()
                    .try_for_each(|v| check_unit("TIER", "tiers[*]", *v))
            }
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn check_unit(policy: &'static str, name: &'static str, value: f64) -> Result<(), FactoryError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(FactoryError::InvalidParameter {
            policy,
            name,
            value,
            expected: "0 <= x <= 1",
        })
    }
}

fn check_fraction(
    policy: &'static str,
    name: &'static str,
    value: f64,
) -> Result<(), FactoryError> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(FactoryError::InvalidParameter {
            policy,
            name,
            value,
            expected: "0 < x < 1",
        })
    }
}

fn check_opt_fraction(
    policy: &'static str,
    name: &'static str,
    value: Option<f64>,
) -> Result<(), FactoryError> {
    value.map_or(Ok(()), |v| check_fraction(policy, name, v))
}

fn check_opt_positive(
    policy: &'static str,
    name: &'static str,
    value: Option<f64>,
) -> Result<(), FactoryError> {
    match value {
        Some(v) if !v.is_finite() || v <= 0.0 => Err(FactoryError::InvalidParameter {
            policy,
            name,
            value: v,
            expected: "> 0",
        }),
        _ => Ok(()),
    }
}

// ─── Exit policy factory ─────────────────────────────────────────────

/// Create an exit policy from its config.
pub fn create_exit_policy(config: &ExitPolicyConfig) -> Result<Box<dyn ExitPolicy>, FactoryError> {
    config.validate()?;
    Ok(build_exit(config))
}

fn build_exit(config: &ExitPolicyConfig) -> Box<dyn ExitPolicy> {
    match config {
        ExitPolicyConfig::SignalOnly => Box::new(SignalOnlyExit),
        ExitPolicyConfig::Fixed {
            take_profit_pct,
            stop_loss_pct,
        } => Box::new(FixedExit::new(*take_profit_pct, *stop_loss_pct)),
        ExitPolicyConfig::Dynamic {
            key,
            targets,
            default,
        } => Box::new(DynamicExit::new(*key, targets.clone(), *default)),
        ExitPolicyConfig::Trailing {
            trail_pct,
            activation_pct,
            initial_stop_pct,
        } => {
            let mut policy = TrailingExit::new(*trail_pct);
            policy.activation_pct = *activation_pct;
            policy.initial_stop_pct = *initial_stop_pct;
            Box::new(policy)
        }
        ExitPolicyConfig::Timeout { hours } => Box::new(TimeoutExit::hours(*hours)),
        ExitPolicyConfig::RegimeGuard {
            adverse_states,
            on_change_only,
        } => Box::new(
            RegimeGuardExit::new(adverse_states.iter().cloned())
                .with_on_change_only(*on_change_only),
        ),
        ExitPolicyConfig::Composite { policies } => {
            Box::new(CompositeExit::new(policies.iter().map(build_exit).collect()))
        }
    }
}

// ─── Sizer factory ───────────────────────────────────────────────────

/// Create a position sizer from its config.
pub fn create_sizer(config: &SizingPolicyConfig) -> Result<Box<dyn PositionSizer>, FactoryError> {
    config.validate()?;
    let sizer: Box<dyn PositionSizer> = match config {
        SizingPolicyConfig::Fixed { fraction } => Box::new(FixedFractionSizer::new(*fraction)),
        SizingPolicyConfig::Kelly {
            window,
            min_trades,
            multiplier,
            ceiling,
            fallback,
        } => Box::new(KellySizer {
            window: *window,
            min_trades: *min_trades,
            multiplier: *multiplier,
            ceiling: *ceiling,
            fallback: *fallback,
        }),
        SizingPolicyConfig::Confidence { floor, ceiling } => {
            Box::new(ConfidenceSizer::new(*floor, *ceiling))
        }
        SizingPolicyConfig::Tier { key, tiers, default } => {
            Box::new(TierSizer::new(key.clone(), tiers.clone(), *default))
        }
    };
    Ok(sizer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_adjacently_tagged_json() {
        let json = r#"{"type":"FIXED","params":{"take_profit_pct":0.1,"stop_loss_pct":0.05}}"#;
        let cfg: ExitPolicyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            cfg,
            ExitPolicyConfig::Fixed {
                take_profit_pct: Some(0.1),
                stop_loss_pct: Some(0.05)
            }
        );
        assert_eq!(create_exit_policy(&cfg).unwrap().name(), "fixed");
    }

    #[test]
    fn unit_variant_needs_no_params() {
        let cfg: ExitPolicyConfig = serde_json::from_str(r#"{"type":"SIGNAL_ONLY"}"#).unwrap();
        assert_eq!(cfg, ExitPolicyConfig::SignalOnly);
    }

    #[test]
    fn unknown_type_is_rejected_by_serde() {
        let res: Result<ExitPolicyConfig, _> =
            serde_json::from_str(r#"{"type":"MOON","params":{}}"#);
        assert!(res.is_err());
    }

    #[test]
    fn kelly_defaults_fill_in() {
        let cfg: SizingPolicyConfig =
            serde_json::from_str(r#"{"type":"KELLY","params":{}}"#).unwrap();
        match cfg {
            SizingPolicyConfig::Kelly {
                multiplier,
                ceiling,
                ..
            } => {
                assert_eq!(multiplier, 0.5);
                assert_eq!(ceiling, 0.8);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn with_timeout_wraps_plain_policy() {
        let cfg = ExitPolicyConfig::Fixed {
            take_profit_pct: Some(0.1),
            stop_loss_pct: None,
        };
        match cfg.with_timeout(48) {
            ExitPolicyConfig::Composite { policies } => {
                assert_eq!(policies.len(), 2);
                assert_eq!(policies[1], ExitPolicyConfig::Timeout { hours: 48 });
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn with_timeout_replaces_nested_timeout() {
        let cfg = ExitPolicyConfig::Composite {
            policies: vec![
                ExitPolicyConfig::Timeout { hours: 12 },
                ExitPolicyConfig::Trailing {
                    trail_pct: 0.05,
                    activation_pct: None,
                    initial_stop_pct: None,
                },
            ],
        };
        match cfg.with_timeout(72) {
            ExitPolicyConfig::Composite { policies } => {
                assert_eq!(policies.len(), 2);
                assert_eq!(policies[0], ExitPolicyConfig::Timeout { hours: 72 });
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            ExitPolicyConfig::SignalOnly.with_timeout(24),
            ExitPolicyConfig::Timeout { hours: 24 }
        );
    }

    #[test]
    fn out_of_range_parameters_fail() {
        let bad = ExitPolicyConfig::Trailing {
            trail_pct: 1.5,
            activation_pct: None,
            initial_stop_pct: None,
        };
        assert!(matches!(
            create_exit_policy(&bad),
            Err(FactoryError::InvalidParameter { name: "trail_pct", .. })
        ));
        assert!(create_exit_policy(&ExitPolicyConfig::Timeout { hours: 0 }).is_err());
        assert!(create_sizer(&SizingPolicyConfig::Fixed { fraction: 1.2 }).is_err());
        assert!(create_sizer(&SizingPolicyConfig::Confidence {
            floor: 0.9,
            ceiling: 0.1
        })
        .is_err());
    }

    #[test]
    fn builds_every_sizer() {
        let configs = [
            SizingPolicyConfig::Fixed { fraction: 0.5 },
            SizingPolicyConfig::Kelly {
                window: 20,
                min_trades: 10,
                multiplier: 0.5,
                ceiling: 0.8,
                fallback: 0.25,
            },
            SizingPolicyConfig::Confidence {
                floor: 0.1,
                ceiling: 1.0,
            },
            SizingPolicyConfig::Tier {
                key: "market_state".into(),
                tiers: BTreeMap::new(),
                default: 0.3,
            },
        ];
        let names: Vec<String> = configs
            .iter()
            .map(|c| create_sizer(c).unwrap().name().to_string())
            .collect();
        assert_eq!(names, ["fixed", "kelly", "confidence", "tier"]);
    }
}
