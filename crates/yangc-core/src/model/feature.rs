//! Compiled features and resolved `if-feature` expressions.

use super::ids::{FeatureId, ModuleId, StrId};

/// Runtime state of a feature, registered on the context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FeatureState {
    /// No feature set registered for the module; gates as disabled.
    #[default]
    Unset,
    /// Explicitly enabled.
    Enabled,
    /// Explicitly disabled.
    Disabled,
}

/// A resolved `if-feature` expression.
///
/// Feature names were resolved to [`FeatureId`]s during compilation, so
/// evaluation needs only a predicate over ids.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IfFeature {
    /// Reference to a feature.
    Feature(FeatureId),
    /// `not E`
    Not(Box<IfFeature>),
    /// `E1 and E2`
    And(Box<IfFeature>, Box<IfFeature>),
    /// `E1 or E2`
    Or(Box<IfFeature>, Box<IfFeature>),
}

impl IfFeature {
    /// Evaluate against a feature-state predicate.
    pub fn eval(&self, enabled: &dyn Fn(FeatureId) -> bool) -> bool {
        match self {
            Self::Feature(id) => enabled(*id),
            Self::Not(e) => !e.eval(enabled),
            Self::And(a, b) => a.eval(enabled) && b.eval(enabled),
            Self::Or(a, b) => a.eval(enabled) || b.eval(enabled),
        }
    }

    /// Collect every feature referenced by the expression.
    pub fn collect(&self, out: &mut Vec<FeatureId>) {
        match self {
            Self::Feature(id) => out.push(*id),
            Self::Not(e) => e.collect(out),
            Self::And(a, b) | Self::Or(a, b) => {
                a.collect(out);
                b.collect(out);
            }
        }
    }
}

/// A compiled feature declaration.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompiledFeature {
    /// Feature identifier.
    pub id: FeatureId,
    /// Feature name.
    pub name: StrId,
    /// Declaring module.
    pub module: ModuleId,
    /// Guards over other features; all must hold.
    pub if_features: Vec<IfFeature>,
    /// State registered on the context at compile time.
    pub state: FeatureState,
    /// Effective value: explicitly enabled and all guards satisfied.
    pub enabled: bool,
}
