use super::{
    ActivityRecord, DailyMetricRecord, ImportStore, ImportTemplate, ImportTx, ProjectRecord,
    StoreError, ValidationLogEntry,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    /// site_code -> (insertion sequence, record)
    projects: BTreeMap<String, (u64, ProjectRecord)>,
    activities: BTreeMap<String, ActivityRecord>,
    daily_metrics: BTreeMap<(String, NaiveDate), DailyMetricRecord>,
    validation_logs: Vec<ValidationLogEntry>,
    templates: BTreeMap<String, ImportTemplate>,
    next_seq: u64,
}

/// A write made inside a transaction, replayed onto the shared state at
/// commit.
#[derive(Debug, Clone)]
enum StagedWrite {
    InsertProject(ProjectRecord),
    UpsertProject(ProjectRecord),
    UpsertActivity(ActivityRecord),
    UpsertDailyMetric(DailyMetricRecord),
    LogValidation(ValidationLogEntry),
}

impl MemoryState {
    fn push_project(&mut self, project: &ProjectRecord) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.projects
            .insert(project.site_code.clone(), (seq, project.clone()));
    }

    fn insert_project(&mut self, project: &ProjectRecord) -> Result<(), StoreError> {
        if self.projects.contains_key(&project.site_code) {
            return Err(StoreError::Duplicate {
                entity: "projects",
                key: project.site_code.clone(),
            });
        }
        self.push_project(project);
        Ok(())
    }

    fn upsert_project(&mut self, project: &ProjectRecord) {
        match self.projects.get_mut(&project.site_code) {
            Some((_, existing)) => {
                // name and type stay as first imported
                let project_name = std::mem::take(&mut existing.project_name);
                let project_type = existing.project_type.take();
                *existing = ProjectRecord {
                    project_name,
                    project_type,
                    ..project.clone()
                };
            }
            None => self.push_project(project),
        }
    }

    fn upsert_daily_metric(&mut self, metric: &DailyMetricRecord) {
        let key = (metric.site_code.clone(), metric.metric_date);
        let remarks = match (&metric.remarks, self.daily_metrics.get(&key)) {
            (None, Some(existing)) => existing.remarks.clone(),
            _ => metric.remarks.clone(),
        };
        self.daily_metrics.insert(
            key,
            DailyMetricRecord {
                remarks,
                ..metric.clone()
            },
        );
    }

    fn apply(&mut self, write: &StagedWrite) -> Result<(), StoreError> {
        match write {
            StagedWrite::InsertProject(project) => return self.insert_project(project),
            StagedWrite::UpsertProject(project) => self.upsert_project(project),
            StagedWrite::UpsertActivity(activity) => {
                self.activities
                    .insert(activity.activity_id.clone(), activity.clone());
            }
            StagedWrite::UpsertDailyMetric(metric) => self.upsert_daily_metric(metric),
            StagedWrite::LogValidation(entry) => self.validation_logs.push(entry.clone()),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct FailurePlan {
    commit: bool,
    project_sites: HashSet<String>,
    metric_sites: HashSet<String>,
}

/// In-process store with real transaction semantics: a transaction stages its
/// writes privately and applies them to the shared state on commit.
///
/// Used for `--dry-run` imports and tests. Failures can be injected to
/// exercise rollback and per-write error paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    failures: Arc<Mutex<FailurePlan>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every commit fail.
    pub fn fail_commits(&self) {
        lock(&self.failures).commit = true;
    }

    /// Make project writes for `site_code` fail with a database error.
    pub fn fail_project_writes(&self, site_code: &str) {
        lock(&self.failures).project_sites.insert(site_code.to_string());
    }

    /// Make daily metric writes for `site_code` fail.
    pub fn fail_metric_writes(&self, site_code: &str) {
        lock(&self.failures).metric_sites.insert(site_code.to_string());
    }

    /// Store a project outside any import.
    pub fn seed_project(&self, project: ProjectRecord) {
        lock(&self.state).push_project(&project);
    }

    pub fn projects(&self) -> Vec<ProjectRecord> {
        lock(&self.state)
            .projects
            .values()
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn project(&self, site_code: &str) -> Option<ProjectRecord> {
        lock(&self.state)
            .projects
            .get(site_code)
            .map(|(_, p)| p.clone())
    }

    pub fn activities(&self) -> Vec<ActivityRecord> {
        lock(&self.state).activities.values().cloned().collect()
    }

    /// Metrics ordered by site code, then date.
    pub fn daily_metrics(&self) -> Vec<DailyMetricRecord> {
        lock(&self.state).daily_metrics.values().cloned().collect()
    }

    pub fn validation_logs(&self) -> Vec<ValidationLogEntry> {
        lock(&self.state).validation_logs.clone()
    }
}

#[async_trait]
impl ImportStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn ImportTx>, StoreError> {
        Ok(Box::new(MemoryTx {
            shared: Arc::clone(&self.state),
            view: lock(&self.state).clone(),
            writes: Vec::new(),
            failures: lock(&self.failures).clone(),
        }))
    }

    async fn find_template(
        &self,
        project_type: &str,
    ) -> Result<Option<ImportTemplate>, StoreError> {
        Ok(lock(&self.state).templates.get(project_type).cloned())
    }

    async fn save_template(&self, template: &ImportTemplate) -> Result<(), StoreError> {
        lock(&self.state)
            .templates
            .insert(template.project_type.clone(), template.clone());
        Ok(())
    }

    async fn list_projects(&self) -> Result<Vec<ProjectRecord>, StoreError> {
        let state = lock(&self.state);
        let mut projects: Vec<&(u64, ProjectRecord)> = state.projects.values().collect();
        projects.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(projects.into_iter().map(|(_, p)| p.clone()).collect())
    }
}

/// Reads see the state as of `begin` plus this transaction's own writes;
/// commit replays `writes` onto whatever the shared state holds by then.
struct MemoryTx {
    shared: Arc<Mutex<MemoryState>>,
    view: MemoryState,
    writes: Vec<StagedWrite>,
    failures: FailurePlan,
}

impl MemoryTx {
    fn check_project(&self, site_code: &str) -> Result<(), StoreError> {
        if self.failures.project_sites.contains(site_code) {
            return Err(StoreError::Unavailable(format!(
                "write to projects failed for {site_code}"
            )));
        }
        Ok(())
    }

    fn stage(&mut self, write: StagedWrite) -> Result<(), StoreError> {
        self.view.apply(&write)?;
        self.writes.push(write);
        Ok(())
    }
}

#[async_trait]
impl ImportTx for MemoryTx {
    async fn site_code_exists(&mut self, site_code: &str) -> Result<bool, StoreError> {
        Ok(self.view.projects.contains_key(site_code))
    }

    async fn insert_project(&mut self, project: &ProjectRecord) -> Result<(), StoreError> {
        self.check_project(&project.site_code)?;
        self.stage(StagedWrite::InsertProject(project.clone()))
    }

    async fn upsert_project(&mut self, project: &ProjectRecord) -> Result<(), StoreError> {
        self.check_project(&project.site_code)?;
        self.stage(StagedWrite::UpsertProject(project.clone()))
    }

    async fn upsert_activity(&mut self, activity: &ActivityRecord) -> Result<(), StoreError> {
        self.stage(StagedWrite::UpsertActivity(activity.clone()))
    }

    async fn upsert_daily_metric(&mut self, metric: &DailyMetricRecord) -> Result<(), StoreError> {
        if self.failures.metric_sites.contains(&metric.site_code) {
            return Err(StoreError::Unavailable(format!(
                "write to daily_metrics failed for {}",
                metric.site_code
            )));
        }
        self.stage(StagedWrite::UpsertDailyMetric(metric.clone()))
    }

    async fn log_validation(&mut self, entry: &ValidationLogEntry) -> Result<(), StoreError> {
        self.stage(StagedWrite::LogValidation(entry.clone()))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.failures.commit {
            return Err(StoreError::Unavailable(
                "commit failed: connection lost".to_string(),
            ));
        }
        let mut shared = lock(&self.shared);
        // replay on a copy so a conflicting insert publishes nothing
        let mut next = shared.clone();
        for write in &self.writes {
            next.apply(write)?;
        }
        *shared = next;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
