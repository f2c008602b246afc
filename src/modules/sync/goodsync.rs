//! GoodSync job management
//!
//! Every call runs with the user's GoodSync localization switched to English
//! so that the output is predictable, and switched back afterwards.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::GoodSyncConfig;
use crate::modules::{
    error::{ModuleError, ValidationError},
    executor::{CommandRunner, Invocation},
    interface::{
        ActionOutcome, ActionSpec, ExecutionModule, ModuleArgs, ModuleDocumentation, ModuleResult,
    },
    scoped::{with_scoped_setting, RegistrySettingStore, SettingKey},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum YesNo {
    Yes,
    No,
}

impl YesNo {
    pub const ALL: [YesNo; 2] = [YesNo::Yes, YesNo::No];

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(YesNo::Yes),
            1 => Some(YesNo::No),
            _ => None,
        }
    }

    pub fn flag(self) -> &'static str {
        match self {
            YesNo::Yes => "yes",
            YesNo::No => "no",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    TwoWay,
    LeftToRight,
    RightToLeft,
}

impl Direction {
    pub const ALL: [Direction; 3] = [
        Direction::TwoWay,
        Direction::LeftToRight,
        Direction::RightToLeft,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Direction::TwoWay),
            1 => Some(Direction::LeftToRight),
            2 => Some(Direction::RightToLeft),
            _ => None,
        }
    }

    pub fn flag(self) -> &'static str {
        match self {
            Direction::TwoWay => "2way",
            Direction::LeftToRight => "ltor",
            Direction::RightToLeft => "rtol",
        }
    }
}

/// What to do automatically on a file change or timer tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AutoAction {
    Analyze,
    Sync,
    Nothing,
}

impl AutoAction {
    pub const ALL: [AutoAction; 3] = [AutoAction::Analyze, AutoAction::Sync, AutoAction::Nothing];

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(AutoAction::Analyze),
            1 => Some(AutoAction::Sync),
            2 => Some(AutoAction::Nothing),
            _ => None,
        }
    }

    pub fn flag(self) -> &'static str {
        match self {
            AutoAction::Analyze => "analyze",
            AutoAction::Sync => "sync",
            AutoAction::Nothing => "no",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConflictResolution {
    No,
    Left,
    Right,
    Newer,
}

impl ConflictResolution {
    pub const ALL: [ConflictResolution; 4] = [
        ConflictResolution::No,
        ConflictResolution::Left,
        ConflictResolution::Right,
        ConflictResolution::Newer,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ConflictResolution::No),
            1 => Some(ConflictResolution::Left),
            2 => Some(ConflictResolution::Right),
            3 => Some(ConflictResolution::Newer),
            _ => None,
        }
    }

    pub fn flag(self) -> &'static str {
        match self {
            ConflictResolution::No => "no",
            ConflictResolution::Left => "left",
            ConflictResolution::Right => "right",
            ConflictResolution::Newer => "newer",
        }
    }
}

/// Action performed right after the job is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobOption {
    Analyze,
    Sync,
    MakeCurrent,
}

impl JobOption {
    pub const ALL: [JobOption; 3] = [JobOption::Analyze, JobOption::Sync, JobOption::MakeCurrent];

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(JobOption::Analyze),
            1 => Some(JobOption::Sync),
            2 => Some(JobOption::MakeCurrent),
            _ => None,
        }
    }

    pub fn flag(self) -> &'static str {
        match self {
            JobOption::Analyze => "/analyze",
            JobOption::Sync => "/sync",
            JobOption::MakeCurrent => "/makecurr",
        }
    }
}

const DEFAULT_MINUTES: u32 = 10;

/// Parameters of `job-new`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSpec {
    pub name: String,
    pub left: String,
    pub right: String,
    pub read_only_source: YesNo,
    pub direction: Direction,
    pub cleanup_old_generations: YesNo,
    pub copy_create_time: YesNo,
    pub wait_for_locks: YesNo,
    pub wait_for_locks_minutes: u32,
    pub exclude: String,
    pub include: String,
    pub limit_changes_percent: u32,
    pub on_file_change: AutoAction,
    pub on_timer: AutoAction,
    pub timer_interval_minutes: u32,
    pub auto_resolve: ConflictResolution,
    pub detect_moves: YesNo,
    pub uber_unlocked_upload: YesNo,
    pub option: JobOption,
}

impl JobSpec {
    pub fn new(name: impl Into<String>, left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            left: left.into(),
            right: right.into(),
            read_only_source: YesNo::Yes,
            direction: Direction::LeftToRight,
            cleanup_old_generations: YesNo::Yes,
            copy_create_time: YesNo::Yes,
            wait_for_locks: YesNo::Yes,
            wait_for_locks_minutes: DEFAULT_MINUTES,
            exclude: String::new(),
            include: String::new(),
            limit_changes_percent: 100,
            on_file_change: AutoAction::Nothing,
            on_timer: AutoAction::Nothing,
            timer_interval_minutes: DEFAULT_MINUTES,
            auto_resolve: ConflictResolution::Left,
            detect_moves: YesNo::Yes,
            uber_unlocked_upload: YesNo::Yes,
            option: JobOption::Analyze,
        }
    }

    /// Build a spec from module arguments using the numeric option codes.
    pub fn from_args(args: &ModuleArgs) -> Result<Self, ValidationError> {
        let mut spec = Self::new(
            args.require_str("job_name")?,
            args.require_str("f1")?,
            args.require_str("f2")?,
        );

        if let Some(v) = code(args, "read_only_source", YesNo::from_code)? {
            spec.read_only_source = v;
        }
        if let Some(v) = code(args, "direction", Direction::from_code)? {
            spec.direction = v;
        }
        if let Some(v) = code(args, "cleanup_old_generations", YesNo::from_code)? {
            spec.cleanup_old_generations = v;
        }
        if let Some(v) = code(args, "copy_create_time", YesNo::from_code)? {
            spec.copy_create_time = v;
        }
        if let Some(v) = code(args, "wait_for_locks", YesNo::from_code)? {
            spec.wait_for_locks = v;
        }
        if let Some(v) = args.get_u32("wait_for_locks_minutes")? {
            spec.wait_for_locks_minutes = v;
        }
        if let Some(v) = args.get_str("exclude") {
            spec.exclude = v;
        }
        if let Some(v) = args.get_str("include") {
            spec.include = v;
        }
        if let Some(v) = args.get_u32("limit_changes_percent")? {
            spec.limit_changes_percent = v;
        }
        if let Some(v) = code(args, "on_file_change", AutoAction::from_code)? {
            spec.on_file_change = v;
        }
        if let Some(v) = code(args, "on_timer", AutoAction::from_code)? {
            spec.on_timer = v;
        }
        if let Some(v) = args.get_u32("timer_interval_minutes")? {
            spec.timer_interval_minutes = v;
        }
        if let Some(v) = code(args, "auto_resolve", ConflictResolution::from_code)? {
            spec.auto_resolve = v;
        }
        if let Some(v) = code(args, "detect_moves", YesNo::from_code)? {
            spec.detect_moves = v;
        }
        if let Some(v) = code(args, "uber_unlocked_upload", YesNo::from_code)? {
            spec.uber_unlocked_upload = v;
        }
        if let Some(v) = code(args, "option", JobOption::from_code)? {
            spec.option = v;
        }

        Ok(spec)
    }

    /// `job-new` arguments, in the order GoodSync documents them.
    pub fn tokens(&self) -> Result<Vec<String>, ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::missing("job_name"));
        }
        if self.left.is_empty() {
            return Err(ValidationError::missing("f1"));
        }
        if self.right.is_empty() {
            return Err(ValidationError::missing("f2"));
        }
        if self.limit_changes_percent > 100 {
            return Err(ValidationError::invalid(
                "limit_changes_percent",
                self.limit_changes_percent,
                "must be between 0 and 100",
            ));
        }

        let mut tokens = vec![
            "job-new".to_string(),
            self.name.clone(),
            format!("/f1={}", self.left),
            format!("/f2={}", self.right),
        ];
        tokens.extend(
            [
                "/bad-certs1=yes",
                "/bad-certs2=yes",
                "/hostbased1=yes",
                "/hostbased2=yes",
                "/exclude-empty=no",
                "/exclude-hidden=no",
                "/exclude-system=no",
                "/auto-unattended=yes",
            ]
            .map(String::from),
        );

        tokens.push(format!("/readonly-src={}", self.read_only_source.flag()));
        tokens.push(format!("/dir={}", self.direction.flag()));
        tokens.push(format!(
            "/cleanup-old-generations={}",
            self.cleanup_old_generations.flag()
        ));
        tokens.push(format!("/copy-create-time={}", self.copy_create_time.flag()));
        tokens.push(format!("/wait-for-locks={}", self.wait_for_locks.flag()));
        let lock_minutes = if self.wait_for_locks_minutes > 0 {
            self.wait_for_locks_minutes
        } else {
            DEFAULT_MINUTES
        };
        tokens.push(format!("/wait-for-locks-minutes={lock_minutes}"));

        if !self.exclude.is_empty() {
            tokens.push(format!("/exclude={}", self.exclude));
        }
        if !self.include.is_empty() {
            tokens.push(format!("/include={}", self.include));
        }

        tokens.push(format!("/limit-changes={}", self.limit_changes_percent));
        tokens.push(format!("/on-file-change={}", self.on_file_change.flag()));
        tokens.push(format!("/on-timer={}", self.on_timer.flag()));
        if self.on_timer != AutoAction::Nothing && self.timer_interval_minutes > 0 {
            tokens.push(format!("/timer-period={}", self.timer_interval_minutes));
        }

        tokens.push(format!("/autoresolve={}", self.auto_resolve.flag()));
        tokens.push(format!("/detect-folder-moves={}", self.detect_moves.flag()));
        tokens.push(format!("/detect-moves={}", self.detect_moves.flag()));
        tokens.push(format!("/uber-unlocked={}", self.uber_unlocked_upload.flag()));
        tokens.push(self.option.flag().to_string());

        Ok(tokens)
    }
}

fn code<T>(
    args: &ModuleArgs,
    key: &str,
    decode: fn(u8) -> Option<T>,
) -> Result<Option<T>, ValidationError> {
    let Some(raw) = args.get_u8(key)? else {
        return Ok(None);
    };
    decode(raw)
        .map(Some)
        .ok_or_else(|| ValidationError::invalid(key, raw, "unknown option code"))
}

/// Job names listed by `job-list`. Lines may read `Job 'name'` or just the
/// name.
pub fn parse_job_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let line = line.strip_prefix("Job ").unwrap_or(line);
            line.trim_end_matches(':')
                .trim()
                .trim_matches(|c| c == '\'' || c == '"')
                .to_string()
        })
        .collect()
}

pub struct GoodSyncModule {
    runner: Arc<dyn CommandRunner>,
    registry: RegistrySettingStore,
    config: GoodSyncConfig,
}

impl GoodSyncModule {
    pub fn new(runner: Arc<dyn CommandRunner>, config: GoodSyncConfig) -> Self {
        Self {
            registry: RegistrySettingStore::new(runner.clone()),
            runner,
            config,
        }
    }

    fn invocation(&self, tokens: Vec<String>) -> Invocation {
        let mut all = vec![self.config.executable.to_string_lossy().into_owned()];
        all.extend(tokens);
        Invocation::program(all)
    }

    async fn run_gsync(&self, tokens: Vec<String>) -> Result<String, ModuleError> {
        self.runner.run_checked(&self.invocation(tokens)).await
    }

    /// Run `op` with the user's GoodSync localization forced to English.
    async fn in_english<F, Fut, T>(&self, run_as_user: &str, op: F) -> Result<T, ModuleError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, ModuleError>> + Send,
        T: Send,
    {
        if run_as_user.is_empty() {
            return Err(ValidationError::missing("run_as_user").into());
        }

        let sid = self.registry.user_sid(run_as_user).await?;
        let key = SettingKey::new(
            format!("HKU\\{sid}\\{}", self.config.registry_subkey),
            "LocalizationFile",
        );
        with_scoped_setting(&self.registry, &key, &self.config.localization_file, op).await
    }

    pub async fn job_new(
        &self,
        run_as_user: &str,
        spec: &JobSpec,
    ) -> Result<ActionOutcome, ModuleError> {
        let tokens = spec.tokens()?;

        self.in_english(run_as_user, move || async move {
            let existing = parse_job_list(&self.run_gsync(vec!["job-list".to_string()]).await?);
            if existing.iter().any(|job| job == &spec.name) {
                info!("GoodSync job '{}' already present", spec.name);
                return Ok(ActionOutcome::Unchanged {
                    reason: format!("job '{}' already present", spec.name),
                });
            }

            info!("Creating GoodSync job '{}'", spec.name);
            let output = self.run_gsync(tokens).await?;
            Ok(ActionOutcome::Changed { output })
        })
        .await
    }

    pub async fn job_list(&self, run_as_user: &str) -> Result<String, ModuleError> {
        self.in_english(run_as_user, move || {
            self.run_gsync(vec!["job-list".to_string()])
        })
        .await
    }

    pub async fn job_delete(
        &self,
        run_as_user: &str,
        name: &str,
    ) -> Result<ActionOutcome, ModuleError> {
        if name.is_empty() {
            return Err(ValidationError::missing("job_name").into());
        }

        self.in_english(run_as_user, move || async move {
            let existing = parse_job_list(&self.run_gsync(vec!["job-list".to_string()]).await?);
            if !existing.iter().any(|job| job == name) {
                warn!("GoodSync job '{}' already absent", name);
                return Ok(ActionOutcome::Unchanged {
                    reason: format!("job '{name}' already absent"),
                });
            }

            let output = self
                .run_gsync(vec!["job-delete".to_string(), name.to_string()])
                .await?;
            Ok(ActionOutcome::Changed { output })
        })
        .await
    }

    /// Analyze one job, or every job when `name` is `None`.
    pub async fn analyze(
        &self,
        run_as_user: &str,
        name: Option<&str>,
    ) -> Result<String, ModuleError> {
        let tokens = vec!["analyze".to_string(), job_target(name)];
        self.in_english(run_as_user, move || self.run_gsync(tokens)).await
    }

    /// Synchronize one job, or every job when `name` is `None`.
    pub async fn sync(
        &self,
        run_as_user: &str,
        name: Option<&str>,
    ) -> Result<String, ModuleError> {
        let tokens = vec!["sync".to_string(), job_target(name)];
        self.in_english(run_as_user, move || self.run_gsync(tokens)).await
    }
}

fn job_target(name: Option<&str>) -> String {
    match name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "/all".to_string(),
    }
}

const ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "job_new",
        description: "Create a sync job (skipped when it already exists)",
        required: &["run_as_user", "job_name", "f1", "f2"],
    },
    ActionSpec {
        name: "job_list",
        description: "List all jobs",
        required: &["run_as_user"],
    },
    ActionSpec {
        name: "job_delete",
        description: "Delete a job (skipped when it is absent)",
        required: &["run_as_user", "job_name"],
    },
    ActionSpec {
        name: "analyze",
        description: "Analyze one job, or all jobs when job_name is omitted",
        required: &["run_as_user"],
    },
    ActionSpec {
        name: "sync",
        description: "Synchronize one job, or all jobs when job_name is omitted",
        required: &["run_as_user"],
    },
];

#[async_trait]
impl ExecutionModule for GoodSyncModule {
    fn name(&self) -> &'static str {
        "goodsync"
    }

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    fn actions(&self) -> &'static [ActionSpec] {
        ACTIONS
    }

    async fn execute(&self, args: &ModuleArgs) -> Result<ModuleResult, ModuleError> {
        let user = args.require_str("run_as_user")?;
        let job_name = args.get_str("job_name");

        match args.action.as_str() {
            "job_new" => {
                let spec = JobSpec::from_args(args)?;
                Ok(self.job_new(&user, &spec).await?.into())
            }
            "job_list" => Ok(ModuleResult::output(self.job_list(&user).await?)),
            "job_delete" => {
                let name = args.require_str("job_name")?;
                Ok(self.job_delete(&user, &name).await?.into())
            }
            "analyze" => Ok(ModuleResult::output(
                self.analyze(&user, job_name.as_deref()).await?,
            )),
            "sync" => Ok(ModuleResult::output(
                self.sync(&user, job_name.as_deref()).await?,
            )),
            other => Err(ModuleError::UnsupportedAction {
                module: self.name().to_string(),
                action: other.to_string(),
            }),
        }
    }

    fn documentation(&self) -> ModuleDocumentation {
        ModuleDocumentation {
            description: "Manage GoodSync jobs through GoodSync.exe".to_string(),
            actions: ACTIONS.to_vec(),
            examples: vec![
                r#"goodsync job_new -a run_as_user=Administrator -a job_name=web -a f1=C:\f1 -a f2=C:\f2"#.to_string(),
                r#"goodsync job_new -a run_as_user=Administrator -a job_name=web -a f1=C:\f1 -a f2=C:\f2 -a exclude="*.svn|*.tmp" -a on_file_change=1"#.to_string(),
                "goodsync sync -a run_as_user=Administrator".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::executor::RecordingRunner;
    use std::collections::HashSet;

    const SID: &str = "S-1-5-21-1-2-3-500";

    fn module(runner: &Arc<RecordingRunner>) -> GoodSyncModule {
        GoodSyncModule::new(runner.clone(), GoodSyncConfig::default())
    }

    /// Responses for SID lookup, reading and overriding the localization.
    fn queue_scope_entry(runner: &RecordingRunner) {
        runner
            .push_output(SID, 0)
            .push_output("    LocalizationFile    REG_SZ    zh-chinese.rfi", 0)
            .push_output("", 0);
    }

    #[test]
    fn test_default_tokens() {
        let tokens = JobSpec::new("web", "C:\\f1", "C:\\f2").tokens().unwrap();

        assert_eq!(&tokens[..4], &["job-new", "web", "/f1=C:\\f1", "/f2=C:\\f2"]);
        assert!(tokens.contains(&"/auto-unattended=yes".to_string()));
        assert!(tokens.contains(&"/readonly-src=yes".to_string()));
        assert!(tokens.contains(&"/dir=ltor".to_string()));
        assert!(tokens.contains(&"/wait-for-locks-minutes=10".to_string()));
        assert!(tokens.contains(&"/limit-changes=100".to_string()));
        assert!(tokens.contains(&"/on-timer=no".to_string()));
        assert!(!tokens.iter().any(|t| t.starts_with("/timer-period")));
        assert!(!tokens.iter().any(|t| t.starts_with("/exclude=")));
        assert!(tokens.contains(&"/autoresolve=left".to_string()));
        assert_eq!(tokens.last().map(String::as_str), Some("/analyze"));
    }

    #[test]
    fn test_tokens_from_codes() {
        let args = ModuleArgs::new("job_new")
            .with("job_name", "233")
            .with("f1", "c:\\f1")
            .with("f2", "c:\\f2")
            .with("direction", 0)
            .with("exclude", "*.svn|*.233")
            .with("on_timer", "1")
            .with("timer_interval_minutes", 30)
            .with("detect_moves", 1)
            .with("option", 2);

        let tokens = JobSpec::from_args(&args).unwrap().tokens().unwrap();
        assert!(tokens.contains(&"/dir=2way".to_string()));
        assert!(tokens.contains(&"/exclude=*.svn|*.233".to_string()));
        assert!(tokens.contains(&"/on-timer=sync".to_string()));
        assert!(tokens.contains(&"/timer-period=30".to_string()));
        assert!(tokens.contains(&"/detect-folder-moves=no".to_string()));
        assert!(tokens.contains(&"/detect-moves=no".to_string()));
        assert_eq!(tokens.last().map(String::as_str), Some("/makecurr"));
    }

    #[test]
    fn test_unknown_code_rejected() {
        let args = ModuleArgs::new("job_new")
            .with("job_name", "a")
            .with("f1", "x")
            .with("f2", "y")
            .with("direction", 3);

        let err = JobSpec::from_args(&args).unwrap_err();
        assert_eq!(
            err,
            ValidationError::invalid("direction", 3, "unknown option code")
        );
    }

    #[test]
    fn test_limit_changes_range_enforced() {
        let mut spec = JobSpec::new("a", "x", "y");
        spec.limit_changes_percent = 101;
        assert!(spec.tokens().is_err());

        spec.limit_changes_percent = 0;
        assert!(spec.tokens().unwrap().contains(&"/limit-changes=0".to_string()));
    }

    #[test]
    fn test_option_tables_are_distinct() {
        let yes_no: HashSet<_> = YesNo::ALL.iter().map(|v| v.flag()).collect();
        let dirs: HashSet<_> = Direction::ALL.iter().map(|v| v.flag()).collect();
        let actions: HashSet<_> = AutoAction::ALL.iter().map(|v| v.flag()).collect();
        let conflicts: HashSet<_> = ConflictResolution::ALL.iter().map(|v| v.flag()).collect();
        let options: HashSet<_> = JobOption::ALL.iter().map(|v| v.flag()).collect();

        assert_eq!(yes_no.len(), 2);
        assert_eq!(dirs.len(), 3);
        assert_eq!(actions.len(), 3);
        assert_eq!(conflicts.len(), 4);
        assert_eq!(options.len(), 3);
        assert_eq!(Direction::from_code(2).map(Direction::flag), Some("rtol"));
    }

    #[test]
    fn test_parse_job_list() {
        let output = "Job 'web':\n  Job 'backup'\n\nplain\n";
        assert_eq!(parse_job_list(output), vec!["web", "backup", "plain"]);
    }

    #[tokio::test]
    async fn test_job_new_runs_in_english_scope() {
        let runner = Arc::new(RecordingRunner::new());
        queue_scope_entry(&runner);
        runner
            .push_output("Job 'other'", 0)
            .push_output("Created job web", 0)
            .push_output("", 0);

        let outcome = module(&runner)
            .job_new("Administrator", &JobSpec::new("web", "C:\\f1", "C:\\f2"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ActionOutcome::Changed {
                output: "Created job web".to_string()
            }
        );

        let lines = runner.command_lines();
        assert_eq!(lines.len(), 6);
        assert!(lines[2].contains("en-english.rfi"));
        assert!(lines[3].ends_with("job-list"));
        assert!(lines[4].contains("job-new web"));
        assert!(lines[5].contains("zh-chinese.rfi"));
    }

    #[tokio::test]
    async fn test_job_new_existing_job_is_unchanged() {
        let runner = Arc::new(RecordingRunner::new());
        queue_scope_entry(&runner);
        runner.push_output("Job 'web'", 0).push_output("", 0);

        let outcome = module(&runner)
            .job_new("Administrator", &JobSpec::new("web", "C:\\f1", "C:\\f2"))
            .await
            .unwrap();

        assert!(matches!(outcome, ActionOutcome::Unchanged { .. }));
        let lines = runner.command_lines();
        assert!(!lines.iter().any(|l| l.contains("job-new")));
        assert!(lines.last().unwrap().contains("zh-chinese.rfi"));
    }

    #[tokio::test]
    async fn test_failure_still_restores_language() {
        let runner = Arc::new(RecordingRunner::new());
        queue_scope_entry(&runner);
        runner
            .push_output("Error: no such job", 3)
            .push_output("", 0);

        let err = module(&runner)
            .sync("Administrator", Some("missing"))
            .await
            .unwrap_err();

        assert_eq!(err.output(), Some("Error: no such job"));
        let lines = runner.command_lines();
        assert!(lines[3].ends_with("sync missing"));
        assert!(lines[4].contains("zh-chinese.rfi"));
    }

    #[tokio::test]
    async fn test_analyze_all() {
        let runner = Arc::new(RecordingRunner::new());
        queue_scope_entry(&runner);

        module(&runner).analyze("Administrator", None).await.unwrap();
        assert!(runner.command_lines()[3].ends_with("analyze /all"));
    }

    #[tokio::test]
    async fn test_missing_input_spawns_nothing() {
        let runner = Arc::new(RecordingRunner::new());
        let module = module(&runner);

        let err = module
            .job_new("Administrator", &JobSpec::new("", "x", "y"))
            .await
            .unwrap_err();
        assert!(matches!(err, ModuleError::Validation(_)));

        let err = module.job_list("").await.unwrap_err();
        assert!(matches!(err, ModuleError::Validation(_)));

        assert!(runner.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_job_delete_absent() {
        let runner = Arc::new(RecordingRunner::new());
        queue_scope_entry(&runner);
        runner.push_output("Job 'other'", 0).push_output("", 0);

        let outcome = module(&runner)
            .job_delete("Administrator", "web")
            .await
            .unwrap();
        assert!(matches!(outcome, ActionOutcome::Unchanged { .. }));
    }
}
