/// How much of a finished pod's container output gets persisted to the
/// launch store. Gates `LaunchRecord` creation in the pod event processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodOutputSaveMode {
    /// Never persist a launch record.
    None,
    /// Persist only launches whose agent exited non-zero.
    Error,
    /// Persist every launch.
    All,
}

impl PodOutputSaveMode {
    /// Whether a launch with the given exit code should be persisted under
    /// this mode.
    pub fn should_save(self, exit_code: i32) -> bool {
        match self {
            PodOutputSaveMode::None => false,
            PodOutputSaveMode::Error => exit_code != 0,
            PodOutputSaveMode::All => true,
        }
    }
}

impl std::str::FromStr for PodOutputSaveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(PodOutputSaveMode::None),
            "Error" => Ok(PodOutputSaveMode::Error),
            "All" => Ok(PodOutputSaveMode::All),
            other => Err(format!("invalid pod output save mode '{other}'")),
        }
    }
}
