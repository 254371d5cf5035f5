use serde::Deserialize;
use std::fmt::Display;
use std::process::Command;

use super::error::SchedulerError;
use super::status::StatusCode;

/// HTCondor job states, numbered as in the `JobStatus` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Unexpanded,
    Idle,
    Running,
    Removed,
    Completed,
    Held,
    TransferringOutput,
    Suspended,
    /// A status code this tool does not know about
    Other(i64),
}

impl From<i64> for JobState {
    fn from(value: i64) -> Self {
        match value {
            0 => Self::Unexpanded,
            1 => Self::Idle,
            2 => Self::Running,
            3 => Self::Removed,
            4 => Self::Completed,
            5 => Self::Held,
            6 => Self::TransferringOutput,
            7 => Self::Suspended,
            other => Self::Other(other),
        }
    }
}

impl Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unexpanded => "Unexpanded",
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Removed => "Removed",
            Self::Completed => "Completed",
            Self::Held => "Held",
            Self::TransferringOutput => "Transferring Output",
            Self::Suspended => "Suspended",
            Self::Other(code) => return write!(f, "Unknown ({code})"),
        };
        write!(f, "{name}")
    }
}

impl JobState {
    /// States that do not need an operator
    pub fn is_acceptable(&self) -> bool {
        matches!(self, Self::Running | Self::Idle | Self::Completed)
    }
}

/// The kinds of job an Omicron DAG submits, each tagged by a ClassAd attribute holding the group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobClass {
    Manager,
    Process,
    PostProcess,
}

impl JobClass {
    pub fn attribute(&self) -> &'static str {
        match self {
            Self::Manager => "OmicronManager",
            Self::Process => "OmicronProcess",
            Self::PostProcess => "OmicronPostProcess",
        }
    }

    pub fn all() -> [JobClass; 3] {
        [Self::Manager, Self::Process, Self::PostProcess]
    }
}

impl Display for JobClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.attribute())
    }
}

/// A single scheduler job. Times are Unix seconds as reported by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub cluster_id: i64,
    pub proc_id: i64,
    pub class: JobClass,
    pub state: JobState,
    pub entered_current_status: Option<i64>,
    pub job_start_date: Option<i64>,
}

impl Job {
    pub fn id(&self) -> String {
        format!("{}.{}", self.cluster_id, self.proc_id)
    }

    /// How long the job has been (or was) running, in seconds
    pub fn duration(&self, now_unix: i64) -> Option<i64> {
        let start = self.job_start_date?;
        let end = match self.state {
            JobState::Running => now_unix,
            _ => self.entered_current_status.unwrap_or(now_unix),
        };
        Some((end - start).max(0))
    }
}

/// Anything that can list the jobs of a given class for a group
pub trait Scheduler {
    fn query(&self, class: JobClass, group: &str) -> Result<Vec<Job>, SchedulerError>;
}

/// Raw ClassAd fields returned by `condor_q -json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JobAd {
    cluster_id: i64,
    #[serde(default)]
    proc_id: i64,
    job_status: i64,
    #[serde(default)]
    entered_current_status: Option<i64>,
    #[serde(default)]
    job_start_date: Option<i64>,
}

const QUERY_ATTRIBUTES: &str = "ClusterId,ProcId,JobStatus,EnteredCurrentStatus,JobStartDate";

/// Parse the JSON printed by `condor_q -json`. No matching jobs prints nothing at all.
pub fn parse_condor_json(class: JobClass, output: &str) -> Result<Vec<Job>, SchedulerError> {
    if output.trim().is_empty() {
        return Ok(vec![]);
    }
    let ads: Vec<JobAd> = serde_json::from_str(output)?;
    Ok(ads
        .into_iter()
        .map(|ad| Job {
            cluster_id: ad.cluster_id,
            proc_id: ad.proc_id,
            class,
            state: JobState::from(ad.job_status),
            entered_current_status: ad.entered_current_status,
            job_start_date: ad.job_start_date,
        })
        .collect())
}

/// Queries the local HTCondor schedd through `condor_q`
#[derive(Debug, Clone)]
pub struct CondorScheduler {
    executable: String,
}

impl Default for CondorScheduler {
    fn default() -> Self {
        Self::new("condor_q")
    }
}

impl CondorScheduler {
    pub fn new(executable: &str) -> Self {
        Self {
            executable: executable.to_string(),
        }
    }
}

impl Scheduler for CondorScheduler {
    fn query(&self, class: JobClass, group: &str) -> Result<Vec<Job>, SchedulerError> {
        let constraint = format!("{} == \"{}\"", class.attribute(), group);
        let label = format!("{} -constraint '{}'", self.executable, constraint);
        log::debug!("Running {label}");
        let output = Command::new(&self.executable)
            .args(["-allusers", "-json", "-constraint"])
            .arg(&constraint)
            .args(["-attributes", QUERY_ATTRIBUTES])
            .output()
            .map_err(|e| SchedulerError::SpawnError(label.clone(), e))?;
        if !output.status.success() {
            return Err(SchedulerError::QueryFailed(
                label,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        parse_condor_json(class, &String::from_utf8_lossy(&output.stdout))
    }
}

/// Outcome of the scheduler check
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerCheck {
    pub code: StatusCode,
    pub message: String,
    pub jobs: Vec<Job>,
}

/// Check that a group has exactly one manager and that no job needs attention.
///
/// Anomalies are reported as a CRITICAL check; failing to talk to the scheduler is an error.
pub fn check_scheduler(
    scheduler: &dyn Scheduler,
    group: &str,
) -> Result<SchedulerCheck, SchedulerError> {
    let mut jobs = Vec::new();
    for class in JobClass::all() {
        jobs.extend(scheduler.query(class, group)?);
    }

    let n_managers = jobs.iter().filter(|j| j.class == JobClass::Manager).count();
    let n_nodes = jobs.len() - n_managers;
    let (code, message) = if n_managers != 1 {
        (
            StatusCode::Critical,
            format!("Failed to identify a unique manager job for {group}: found {n_managers}"),
        )
    } else if let Some(job) = jobs.iter().find(|j| !j.state.is_acceptable()) {
        (
            StatusCode::Critical,
            format!(
                "{} job {} for {} is in state '{}'",
                job.class, job.id(), group, job.state
            ),
        )
    } else {
        (
            StatusCode::Ok,
            format!("Omicron processing for {group} is running normally ({n_nodes} node jobs)"),
        )
    };

    match code {
        StatusCode::Ok => log::info!("{message}"),
        _ => log::error!("{message}"),
    }

    Ok(SchedulerCheck {
        code,
        message,
        jobs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scheduler with a fixed set of jobs
    struct FixedScheduler {
        jobs: Vec<Job>,
    }

    impl Scheduler for FixedScheduler {
        fn query(&self, class: JobClass, _group: &str) -> Result<Vec<Job>, SchedulerError> {
            Ok(self
                .jobs
                .iter()
                .filter(|j| j.class == class)
                .cloned()
                .collect())
        }
    }

    fn job(cluster_id: i64, class: JobClass, state: JobState) -> Job {
        Job {
            cluster_id,
            proc_id: 0,
            class,
            state,
            entered_current_status: Some(1000),
            job_start_date: Some(400),
        }
    }

    #[test]
    fn test_single_running_manager_is_ok() {
        let scheduler = FixedScheduler {
            jobs: vec![job(1, JobClass::Manager, JobState::Running)],
        };
        let check = check_scheduler(&scheduler, "GW").unwrap();
        assert_eq!(check.code, StatusCode::Ok);
        assert_eq!(check.code.code(), 0);
    }

    #[test]
    fn test_two_managers_is_critical() {
        let scheduler = FixedScheduler {
            jobs: vec![
                job(1, JobClass::Manager, JobState::Running),
                job(2, JobClass::Manager, JobState::Running),
            ],
        };
        let check = check_scheduler(&scheduler, "GW").unwrap();
        assert_eq!(check.code.code(), 2);
        assert!(check.message.contains("GW"));
    }

    #[test]
    fn test_no_manager_is_critical() {
        let scheduler = FixedScheduler {
            jobs: vec![job(5, JobClass::Process, JobState::Idle)],
        };
        let check = check_scheduler(&scheduler, "GW").unwrap();
        assert_eq!(check.code, StatusCode::Critical);
    }

    #[test]
    fn test_held_node_is_critical() {
        let scheduler = FixedScheduler {
            jobs: vec![
                job(1, JobClass::Manager, JobState::Running),
                job(2, JobClass::Process, JobState::Completed),
                job(3, JobClass::PostProcess, JobState::Held),
            ],
        };
        let check = check_scheduler(&scheduler, "GW").unwrap();
        assert_eq!(check.code, StatusCode::Critical);
        assert!(check.message.contains("3.0"));
        assert!(check.message.contains("Held"));
        assert_eq!(check.jobs.len(), 3);
    }

    #[test]
    fn test_parse_condor_json() {
        let output = r#"[
            {"ClusterId": 12, "ProcId": 0, "JobStatus": 2, "EnteredCurrentStatus": 1500000000, "JobStartDate": 1499990000},
            {"ClusterId": 13, "JobStatus": 1, "EnteredCurrentStatus": 1500000100}
        ]"#;
        let jobs = parse_condor_json(JobClass::Process, output).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].state, JobState::Running);
        assert_eq!(jobs[0].duration(1500000000), Some(10000));
        assert_eq!(jobs[1].job_start_date, None);
        assert_eq!(jobs[1].duration(1500000000), None);

        assert!(parse_condor_json(JobClass::Manager, "\n").unwrap().is_empty());
        let unknown = r#"[{"ClusterId": 1, "JobStatus": 9}]"#;
        let jobs = parse_condor_json(JobClass::Manager, unknown).unwrap();
        assert_eq!(jobs[0].state, JobState::Other(9));
        assert!(parse_condor_json(JobClass::Manager, "not json").is_err());
    }

    #[test]
    fn test_unknown_status_is_critical() {
        let scheduler = FixedScheduler {
            jobs: vec![
                job(1, JobClass::Manager, JobState::Running),
                job(2, JobClass::Process, JobState::from(12)),
            ],
        };
        let check = check_scheduler(&scheduler, "GW").unwrap();
        assert_eq!(check.code, StatusCode::Critical);
        assert!(check.message.contains("2.0"));
        assert!(check.message.contains("Unknown (12)"));
    }

    #[cfg(unix)]
    fn write_script(dir: &std::path::Path, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    #[cfg(unix)]
    #[test]
    fn test_condor_query_runs_executable() {
        let tmp = tempfile::tempdir().unwrap();
        let script = write_script(
            tmp.path(),
            "condor_q",
            r#"cat <<'EOF'
[{"ClusterId": 7, "ProcId": 1, "JobStatus": 2, "JobStartDate": 1499990000}]
EOF"#,
        );
        let jobs = CondorScheduler::new(&script)
            .query(JobClass::Manager, "GW")
            .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id(), "7.1");
        assert_eq!(jobs[0].class, JobClass::Manager);
        assert_eq!(jobs[0].state, JobState::Running);

        let empty = write_script(tmp.path(), "condor_q_empty", "exit 0");
        let jobs = CondorScheduler::new(&empty)
            .query(JobClass::Process, "GW")
            .unwrap();
        assert!(jobs.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_condor_query_failures() {
        let tmp = tempfile::tempdir().unwrap();
        let failing = write_script(
            tmp.path(),
            "condor_q",
            "echo 'schedd unreachable' >&2\nexit 1",
        );
        match CondorScheduler::new(&failing).query(JobClass::Manager, "GW") {
            Err(SchedulerError::QueryFailed(_, status, stderr)) => {
                assert_eq!(status.code(), Some(1));
                assert_eq!(stderr, "schedd unreachable");
            }
            other => panic!("unexpected result {other:?}"),
        }

        let missing = tmp.path().join("no_such_condor_q");
        let result =
            CondorScheduler::new(&missing.to_string_lossy()).query(JobClass::Manager, "GW");
        assert!(matches!(result, Err(SchedulerError::SpawnError(_, _))));

        let garbage = write_script(tmp.path(), "condor_q_garbage", "echo '{oops'");
        let result = CondorScheduler::new(&garbage).query(JobClass::Manager, "GW");
        assert!(matches!(result, Err(SchedulerError::ParsingError(_))));
    }
}
