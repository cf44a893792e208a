use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::id::StepId;
use crate::value::PropertyBag;

/// Failure reported by an `up` or `down` function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StepError {
    /// Human-readable reason.
    pub message: String,
}

impl StepError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A pure function from one property bag to the next.
pub type Transform = Arc<dyn Fn(PropertyBag) -> Result<PropertyBag, StepError> + Send + Sync>;

/// The backward half of a step.
///
/// Declaring [`Down::NotReversible`] is permanent: it marks the step as a
/// one-way door, and any down migration that would cross it is refused.
#[derive(Clone)]
pub enum Down {
    /// The step can be undone with this function.
    Reversible(Transform),
    /// The step loses information and cannot be undone.
    NotReversible,
}

impl Down {
    /// Wrap a down function.
    pub fn reversible<F>(f: F) -> Self
    where
        F: Fn(PropertyBag) -> Result<PropertyBag, StepError> + Send + Sync + 'static,
    {
        Self::Reversible(Arc::new(f))
    }

    /// A down function that returns its input unchanged.
    pub fn identity() -> Self {
        Self::reversible(Ok)
    }
}

impl fmt::Debug for Down {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reversible(_) => f.write_str("Reversible(..)"),
            Self::NotReversible => f.write_str("NotReversible"),
        }
    }
}

/// A single schema transformation.
///
/// `up` must accept every bag that can legitimately exist at the previous
/// version. Steps are deterministic and pure: two devices running the same
/// step on the same bag produce identical results.
///
/// # Example
///
/// ```
/// use record_migrate::{Down, MigrationStep, PropertyBag, SequenceId};
///
/// let geo = SequenceId::new("com.shape.geo").unwrap();
/// let add_scale = MigrationStep::new(
///     geo.step(9),
///     |props: PropertyBag| Ok(props.with("scale", 1)),
///     Down::reversible(|props: PropertyBag| Ok(props.without("scale"))),
/// );
///
/// let v9 = add_scale.apply_up(PropertyBag::new()).unwrap();
/// assert_eq!(v9.get_number("scale"), Some(1.0));
/// assert!(add_scale.is_reversible());
/// ```
#[derive(Clone)]
pub struct MigrationStep {
    id: StepId,
    up: Transform,
    down: Down,
    depends_on: Vec<StepId>,
}

impl MigrationStep {
    /// Create a step. Both directions must be decided up front.
    pub fn new<F>(id: StepId, up: F, down: Down) -> Self
    where
        F: Fn(PropertyBag) -> Result<PropertyBag, StepError> + Send + Sync + 'static,
    {
        Self {
            id,
            up: Arc::new(up),
            down,
            depends_on: Vec::new(),
        }
    }

    /// Require `step` (usually from another sequence) to run before this one.
    pub fn depends_on(mut self, step: StepId) -> Self {
        if !self.depends_on.contains(&step) {
            self.depends_on.push(step);
        }
        self
    }

    pub fn id(&self) -> &StepId {
        &self.id
    }

    pub fn down(&self) -> &Down {
        &self.down
    }

    /// Cross-sequence prerequisites.
    pub fn dependencies(&self) -> &[StepId] {
        &self.depends_on
    }

    pub fn is_reversible(&self) -> bool {
        matches!(self.down, Down::Reversible(_))
    }

    /// Run the forward function.
    pub fn apply_up(&self, props: PropertyBag) -> Result<PropertyBag, StepError> {
        (self.up)(props)
    }

    /// Run the backward function, or `None` if the step is not reversible.
    pub fn apply_down(&self, props: PropertyBag) -> Option<Result<PropertyBag, StepError>> {
        match &self.down {
            Down::Reversible(f) => Some(f(props)),
            Down::NotReversible => None,
        }
    }
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("id", &self.id)
            .field("down", &self.down)
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}
