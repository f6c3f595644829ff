//! Background scheduler (§4.8): one timing loop owning all job state,
//! driven by a command channel rather than shared mutable state (§9's
//! message-driven redesign). Daily-windowed, interval, and one-shot jobs
//! all reduce to "what's the next instant this job should fire."

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use futures::future::BoxFuture;
use log::{info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Duration, MissedTickBehavior};

pub mod jobs;

/// A job's work function: takes no arguments (the caller closes over
/// whatever `AppContext`/entity config it needs) and resolves once its
/// sync attempt is done. Wrapped in `Arc` so the same fn can be re-armed
/// after each run without re-registering.
pub type JobFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Clone)]
pub enum JobKind {
    /// Fires once per day at `window_start`; the window itself is re-checked
    /// by the caller's job function (or by `trigger_sync`) rather than here,
    /// since only the caller knows what "within window" should gate.
    DailyWindowed { window_start: NaiveTime, window_end: NaiveTime },
    Interval { every: Duration },
    OneShot { run_at: DateTime<Utc> },
}

struct Job {
    kind: JobKind,
    func: JobFn,
    paused: bool,
    running: bool,
    next_run_at: Option<DateTime<Utc>>,
    last_run_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct JobStatus {
    pub id: String,
    pub paused: bool,
    pub next_run_at: Option<String>,
    pub last_run_at: Option<String>,
}

enum Command {
    AddSyncJob {
        id: String,
        window_start: NaiveTime,
        window_end: NaiveTime,
        func: JobFn,
        reply: oneshot::Sender<()>,
    },
    AddIntervalJob {
        id: String,
        every: Duration,
        func: JobFn,
        reply: oneshot::Sender<()>,
    },
    AddOneTimeJob {
        id: String,
        run_at: DateTime<Utc>,
        func: JobFn,
        reply: oneshot::Sender<()>,
    },
    Remove { id: String, reply: oneshot::Sender<bool> },
    Pause { id: String, reply: oneshot::Sender<bool> },
    Resume { id: String, reply: oneshot::Sender<bool> },
    /// `force=true` skips the daily-windowed job's window check.
    TriggerNow { id: String, force: bool, reply: oneshot::Sender<bool> },
    GetStatus { id: String, reply: oneshot::Sender<Option<JobStatus>> },
    ListJobs { reply: oneshot::Sender<Vec<JobStatus>> },
    Stop { reply: oneshot::Sender<()> },
    /// Sent by a job's own spawned task once its future resolves, so
    /// `max_instances=1` is enforced against actual completion rather than
    /// a fixed schedule.
    JobFinished { id: String },
}

/// Handle held by callers; the actual job map lives inside the timing loop
/// task and is only ever touched from there.
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<Command>,
}

const TICK_INTERVAL: Duration = Duration::from_secs(30);

impl SchedulerHandle {
    /// Spawn the timing loop and return a handle to it. Mirrors
    /// `BackgroundScheduler.start()`: the loop itself is the "is_running"
    /// state, so there is nothing to toggle before jobs can be added.
    pub fn start() -> Self {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(run_loop(rx, tx.clone()));
        info!("scheduler started");
        Self { commands: tx }
    }

    pub async fn add_sync_job(&self, entity: &str, window_start: NaiveTime, window_end: NaiveTime, func: JobFn) {
        let (reply, ack) = oneshot::channel();
        let _ = self
            .commands
            .send(Command::AddSyncJob { id: entity.to_string(), window_start, window_end, func, reply })
            .await;
        let _ = ack.await;
    }

    pub async fn add_interval_job(&self, id: &str, every: Duration, func: JobFn) {
        let (reply, ack) = oneshot::channel();
        let _ = self.commands.send(Command::AddIntervalJob { id: id.to_string(), every, func, reply }).await;
        let _ = ack.await;
    }

    pub async fn add_one_time_job(&self, id: &str, run_at: DateTime<Utc>, func: JobFn) {
        let (reply, ack) = oneshot::channel();
        let _ = self.commands.send(Command::AddOneTimeJob { id: id.to_string(), run_at, func, reply }).await;
        let _ = ack.await;
    }

    pub async fn remove_job(&self, id: &str) -> bool {
        self.call(|reply| Command::Remove { id: id.to_string(), reply }).await.unwrap_or(false)
    }

    pub async fn pause_job(&self, id: &str) -> bool {
        self.call(|reply| Command::Pause { id: id.to_string(), reply }).await.unwrap_or(false)
    }

    pub async fn resume_job(&self, id: &str) -> bool {
        self.call(|reply| Command::Resume { id: id.to_string(), reply }).await.unwrap_or(false)
    }

    /// Mirrors `trigger_sync(force)`: with `force=false` a daily-windowed
    /// job only runs if the current time is within its window; interval and
    /// one-shot jobs always run. Returns `false` if the job doesn't exist or
    /// the window check rejected the run.
    pub async fn trigger_now(&self, id: &str, force: bool) -> bool {
        self.call(|reply| Command::TriggerNow { id: id.to_string(), force, reply }).await.unwrap_or(false)
    }

    pub async fn get_job_status(&self, id: &str) -> Option<JobStatus> {
        self.call(|reply| Command::GetStatus { id: id.to_string(), reply }).await.flatten()
    }

    pub async fn list_jobs(&self) -> Vec<JobStatus> {
        self.call(|reply| Command::ListJobs { reply }).await.unwrap_or_default()
    }

    /// Cooperative shutdown: the loop stops scheduling new runs and exits.
    /// In-flight job futures are not awaited here — they were spawned as
    /// their own tasks and run to completion independently.
    pub async fn stop(&self) {
        let _ = self.call(|reply| Command::Stop { reply }).await;
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (reply, ack) = oneshot::channel();
        self.commands.send(make(reply)).await.ok()?;
        ack.await.ok()
    }
}

async fn run_loop(mut commands: mpsc::Receiver<Command>, self_tx: mpsc::Sender<Command>) {
    let mut jobs: HashMap<String, Job> = HashMap::new();
    let mut ticker = interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                fire_due_jobs(&mut jobs, &self_tx);
            }
            cmd = commands.recv() => {
                match cmd {
                    Some(Command::Stop { reply }) => {
                        info!("scheduler stopping, {} job(s) registered", jobs.len());
                        let _ = reply.send(());
                        return;
                    }
                    Some(cmd) => handle_command(&mut jobs, cmd, &self_tx),
                    None => return,
                }
            }
        }
    }
}

fn handle_command(jobs: &mut HashMap<String, Job>, cmd: Command, self_tx: &mpsc::Sender<Command>) {
    match cmd {
        Command::AddSyncJob { id, window_start, window_end, func, reply } => {
            let next_run_at = Some(next_daily_occurrence(window_start));
            jobs.insert(
                id.clone(),
                Job { kind: JobKind::DailyWindowed { window_start, window_end }, func, paused: false, running: false, next_run_at, last_run_at: None },
            );
            info!("added sync job '{id}', next run at window start {window_start}");
            let _ = reply.send(());
        }
        Command::AddIntervalJob { id, every, func, reply } => {
            let next_run_at = Some(Utc::now() + ChronoDuration::from_std(every).unwrap_or_default());
            jobs.insert(id.clone(), Job { kind: JobKind::Interval { every }, func, paused: false, running: false, next_run_at, last_run_at: None });
            info!("added interval job '{id}', every {every:?}");
            let _ = reply.send(());
        }
        Command::AddOneTimeJob { id, run_at, func, reply } => {
            jobs.insert(
                id.clone(),
                Job { kind: JobKind::OneShot { run_at }, func, paused: false, running: false, next_run_at: Some(run_at), last_run_at: None },
            );
            info!("added one-time job '{id}', run at {run_at}");
            let _ = reply.send(());
        }
        Command::Remove { id, reply } => {
            let removed = jobs.remove(&id).is_some();
            let _ = reply.send(removed);
        }
        Command::Pause { id, reply } => {
            let paused = jobs.get_mut(&id).map(|j| j.paused = true).is_some();
            let _ = reply.send(paused);
        }
        Command::Resume { id, reply } => {
            let resumed = jobs.get_mut(&id).map(|j| j.paused = false).is_some();
            let _ = reply.send(resumed);
        }
        Command::TriggerNow { id, force, reply } => {
            let fired = match jobs.get_mut(&id) {
                Some(job) if !job.running => {
                    let allowed = force
                        || !matches!(job.kind, JobKind::DailyWindowed { window_start, window_end }
                            if !is_within_window(Utc::now().time(), window_start, window_end));
                    if allowed {
                        spawn_job(&id, job, self_tx.clone());
                    }
                    allowed
                }
                _ => false,
            };
            let _ = reply.send(fired);
        }
        Command::GetStatus { id, reply } => {
            let _ = reply.send(jobs.get(&id).map(|j| status_of(&id, j)));
        }
        Command::ListJobs { reply } => {
            let statuses = jobs.iter().map(|(id, job)| status_of(id, job)).collect();
            let _ = reply.send(statuses);
        }
        Command::Stop { reply } => {
            let _ = reply.send(());
        }
        Command::JobFinished { id } => {
            if let Some(job) = jobs.get_mut(&id) {
                job.running = false;
            }
        }
    }
}

fn fire_due_jobs(jobs: &mut HashMap<String, Job>, self_tx: &mpsc::Sender<Command>) {
    let now = Utc::now();
    let mut finished_one_shots = Vec::new();

    for (id, job) in jobs.iter_mut() {
        if job.paused || job.running {
            continue;
        }
        let Some(next_run_at) = job.next_run_at else { continue };
        if next_run_at > now {
            continue;
        }

        match &job.kind {
            JobKind::DailyWindowed { window_start, .. } => {
                spawn_job(id, job, self_tx.clone());
                // Coalesce missed runs: always advance to the next future
                // occurrence rather than queuing up every day that passed.
                job.next_run_at = Some(next_daily_occurrence(*window_start));
            }
            JobKind::Interval { every } => {
                spawn_job(id, job, self_tx.clone());
                job.next_run_at = Some(now + ChronoDuration::from_std(*every).unwrap_or_default());
            }
            JobKind::OneShot { .. } => {
                spawn_job(id, job, self_tx.clone());
                job.next_run_at = None;
                finished_one_shots.push(id.clone());
            }
        }
    }

    for id in finished_one_shots {
        jobs.remove(&id);
    }
}

/// Fires `job` as its own task and marks it running; the task reports back
/// via `Command::JobFinished` once `job.func` resolves, so `running` only
/// clears on actual completion rather than on a timer.
fn spawn_job(id: &str, job: &mut Job, self_tx: mpsc::Sender<Command>) {
    job.running = true;
    job.last_run_at = Some(Utc::now());
    let func = job.func.clone();
    let label = id.to_string();
    tokio::spawn(async move {
        func().await;
        info!("job '{label}' finished");
        let _ = self_tx.send(Command::JobFinished { id: label }).await;
    });
}

fn status_of(id: &str, job: &Job) -> JobStatus {
    JobStatus {
        id: id.to_string(),
        paused: job.paused,
        next_run_at: job.next_run_at.map(|t| t.to_rfc3339()),
        last_run_at: job.last_run_at.map(|t| t.to_rfc3339()),
    }
}

fn next_daily_occurrence(window_start: NaiveTime) -> DateTime<Utc> {
    let now = Utc::now();
    let today_at_start = now.date_naive().and_time(window_start).and_utc();
    if today_at_start > now {
        today_at_start
    } else {
        today_at_start + ChronoDuration::days(1)
    }
}

/// Whether `current` falls within `[window_start, window_end]`, handling
/// overnight windows where `window_start > window_end` (e.g. 19:00-07:00).
pub fn is_within_window(current: NaiveTime, window_start: NaiveTime, window_end: NaiveTime) -> bool {
    if window_start <= window_end {
        window_start <= current && current <= window_end
    } else {
        current >= window_start || current <= window_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn same_day_window_is_inclusive_on_both_ends() {
        assert!(is_within_window(time(9, 0), time(9, 0), time(17, 0)));
        assert!(is_within_window(time(17, 0), time(9, 0), time(17, 0)));
        assert!(is_within_window(time(12, 0), time(9, 0), time(17, 0)));
        assert!(!is_within_window(time(8, 59), time(9, 0), time(17, 0)));
    }

    #[test]
    fn overnight_window_wraps_past_midnight() {
        assert!(is_within_window(time(23, 0), time(19, 0), time(7, 0)));
        assert!(is_within_window(time(3, 0), time(19, 0), time(7, 0)));
        assert!(!is_within_window(time(12, 0), time(19, 0), time(7, 0)));
    }

    #[test]
    fn next_daily_occurrence_is_always_in_the_future() {
        let next = next_daily_occurrence(time(0, 0));
        assert!(next > Utc::now());
    }

    #[tokio::test]
    async fn scheduler_runs_a_one_shot_job_and_removes_it() {
        let handle = SchedulerHandle::start();
        let (tx, rx) = oneshot::channel();
        let tx = std::sync::Mutex::new(Some(tx));
        let func: JobFn = Arc::new(move || {
            let sender = tx.lock().unwrap().take();
            Box::pin(async move {
                if let Some(sender) = sender {
                    let _ = sender.send(());
                }
            })
        });

        handle.add_one_time_job("probe", Utc::now(), func).await;
        tokio::time::timeout(Duration::from_secs(2), rx).await.unwrap().unwrap();
        handle.stop().await;
    }

    #[tokio::test]
    async fn pause_and_resume_round_trip() {
        let handle = SchedulerHandle::start();
        let func: JobFn = Arc::new(|| Box::pin(async {}));
        handle.add_interval_job("heartbeat", Duration::from_secs(60), func).await;

        assert!(handle.pause_job("heartbeat").await);
        let status = handle.get_job_status("heartbeat").await.unwrap();
        assert!(status.paused);

        assert!(handle.resume_job("heartbeat").await);
        let status = handle.get_job_status("heartbeat").await.unwrap();
        assert!(!status.paused);

        handle.stop().await;
    }

    #[tokio::test]
    async fn remove_job_drops_it_from_listing() {
        let handle = SchedulerHandle::start();
        let func: JobFn = Arc::new(|| Box::pin(async {}));
        handle.add_interval_job("cleanup", Duration::from_secs(60), func).await;
        assert_eq!(handle.list_jobs().await.len(), 1);

        assert!(handle.remove_job("cleanup").await);
        assert!(handle.list_jobs().await.is_empty());
        handle.stop().await;
    }
}
