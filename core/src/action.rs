use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

/// Named collection routines the driver can schedule.
///
/// The set is fixed at compile time; membership is validated once when the
/// command line is parsed, not per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Franchise list with division/conference assignments.
    Teams,
    /// Division list.
    Divisions,
    /// Season schedule.
    Schedule,
    /// Game report ids pulled from the season schedule.
    GameReports,
    /// Recognized but performs no collection; smoke-tests argument parsing.
    TestIgnore,
}

impl Action {
    /// Every recognized action name, lowercase.
    pub const NAMES: &'static [&'static str] =
        &["teams", "divisions", "schedule", "gamereports", "testignore"];

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Action::Teams => "teams",
            Action::Divisions => "divisions",
            Action::Schedule => "schedule",
            Action::GameReports => "gamereports",
            Action::TestIgnore => "testignore",
        }
    }

    /// True for actions that deliberately collect nothing.
    pub fn is_noop(self) -> bool {
        matches!(self, Action::TestIgnore)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The requested action is not in the known set.
#[derive(Debug, thiserror::Error)]
#[error("unknown action {0:?} (known: teams, divisions, schedule, gamereports, testignore)")]
pub struct UnknownAction(String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "teams" => Ok(Action::Teams),
            "divisions" => Ok(Action::Divisions),
            "schedule" => Ok(Action::Schedule),
            "gamereports" => Ok(Action::GameReports),
            "testignore" => Ok(Action::TestIgnore),
            _ => Err(UnknownAction(s.to_string())),
        }
    }
}

/// One process-lifetime schedule for a single action.
///
/// Built once from validated CLI input; immutable until shutdown. A missing
/// frequency means run exactly once and exit.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleConfig {
    /// Action to invoke.
    pub action: Action,
    /// Consult/populate the local page cache.
    pub use_cache: bool,
    /// Seconds between scheduled ticks; `None` = run once.
    pub frequency_secs: Option<NonZeroU64>,
}
