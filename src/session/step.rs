use serde::{Deserialize, Serialize};

/// One prompt of a guided session, as supplied by the prompt catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    /// Free-form voice reflection on a prompt
    Recording {
        prompt: String,
        #[serde(default)]
        description: Option<String>,
        /// Overrides the session's recording budget
        #[serde(default)]
        budget_secs: Option<u32>,
    },
    /// A spoken affirmation, recorded like a reflection
    Affirmation {
        prompt: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        budget_secs: Option<u32>,
    },
    Breathing,
    SleepCheckIn {
        #[serde(default)]
        hours_slept: Option<f64>,
    },
}

impl StepKind {
    pub fn recording(prompt: impl Into<String>) -> Self {
        StepKind::Recording {
            prompt: prompt.into(),
            description: None,
            budget_secs: None,
        }
    }

    pub fn affirmation(prompt: impl Into<String>) -> Self {
        StepKind::Affirmation {
            prompt: prompt.into(),
            description: None,
            budget_secs: None,
        }
    }

    pub fn sleep_check_in() -> Self {
        StepKind::SleepCheckIn { hours_slept: None }
    }

    /// Stable tag passed to the journal with each entry
    pub fn tag(&self) -> &'static str {
        match self {
            StepKind::Recording { .. } => "recording",
            StepKind::Affirmation { .. } => "affirmation",
            StepKind::Breathing => "breathing",
            StepKind::SleepCheckIn { .. } => "sleep_check_in",
        }
    }

    pub fn prompt(&self) -> Option<&str> {
        match self {
            StepKind::Recording { prompt, .. } | StepKind::Affirmation { prompt, .. } => {
                Some(prompt)
            }
            _ => None,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            StepKind::Recording { description, .. } | StepKind::Affirmation { description, .. } => {
                description.as_deref()
            }
            _ => None,
        }
    }

    /// Whether the step is completed through a recording take
    pub fn is_recorded(&self) -> bool {
        matches!(
            self,
            StepKind::Recording { .. } | StepKind::Affirmation { .. }
        )
    }

    /// Whether the step may be skipped at all
    pub fn is_skippable(&self) -> bool {
        !matches!(self, StepKind::SleepCheckIn { .. })
    }

    pub(crate) fn budget_override(&self) -> Option<u32> {
        match self {
            StepKind::Recording { budget_secs, .. } | StepKind::Affirmation { budget_secs, .. } => {
                *budget_secs
            }
            _ => None,
        }
    }
}

/// A step and its progress within one session
#[derive(Debug, Clone)]
pub struct Step {
    kind: StepKind,
    complete: bool,
    /// Completion criteria for the kind have been met
    eligible: bool,
}

impl Step {
    pub fn new(kind: StepKind) -> Self {
        Self {
            kind,
            complete: false,
            eligible: false,
        }
    }

    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_eligible(&self) -> bool {
        self.eligible
    }

    pub fn hours_slept(&self) -> Option<f64> {
        match &self.kind {
            StepKind::SleepCheckIn { hours_slept } => *hours_slept,
            _ => None,
        }
    }

    pub(crate) fn set_eligible(&mut self) {
        self.eligible = true;
    }

    pub(crate) fn set_hours_slept(&mut self, hours: f64) {
        if let StepKind::SleepCheckIn { hours_slept } = &mut self.kind {
            *hours_slept = Some(hours);
        }
    }

    /// Returns true when this call completed the step
    pub(crate) fn mark_complete(&mut self) -> bool {
        let newly = !self.complete;
        self.complete = true;
        newly
    }

    /// Forget all progress; only a session restart does this
    pub(crate) fn clear(&mut self, original: &StepKind) {
        self.kind = original.clone();
        self.complete = false;
        self.eligible = false;
    }
}
