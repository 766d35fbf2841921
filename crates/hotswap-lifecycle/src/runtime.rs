use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use hotswap_core::{InstallOptions, PackageMetadata};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::{ContentHasher, Outcome, StatusSnapshot, Transition, UpdateManager};

type Reply<T> = oneshot::Sender<Result<T>>;

/// Who receives a finished manifest hash.
pub enum HashTarget {
    Caller(Reply<String>),
    /// Every waiter queued behind the in-flight bundled content hash.
    BinaryWaiters,
}

/// Events handled one at a time by the lifecycle task.
pub enum LifecycleCommand {
    Install {
        package: PackageMetadata,
        options: InstallOptions,
        reply: Reply<Option<Transition>>,
    },
    Foreground {
        reply: Reply<Option<Transition>>,
    },
    Background,
    Confirm {
        reply: Reply<Option<Transition>>,
    },
    Attach,
    Teardown,
    PageFinished,
    TimerExpired {
        generation: u64,
    },
    IsFirstRun {
        package_hash: String,
        reply: oneshot::Sender<bool>,
    },
    IsFailedUpdate {
        package_hash: Option<String>,
        reply: oneshot::Sender<bool>,
    },
    ClearFailedUpdates {
        reply: Reply<()>,
    },
    ComputeHash {
        root: PathBuf,
        reply: Reply<String>,
    },
    BinaryHash {
        reply: Reply<String>,
    },
    HashComputed {
        result: Result<String>,
        target: HashTarget,
    },
    Status {
        reply: oneshot::Sender<StatusSnapshot>,
    },
}

/// Owns an [`UpdateManager`] inside a single tokio task.
pub struct LifecycleRuntime {
    manager: UpdateManager,
    hasher: Arc<dyn ContentHasher>,
    commands: UnboundedReceiver<LifecycleCommand>,
    loopback: WeakUnboundedSender<LifecycleCommand>,
    binary_waiters: Vec<Reply<String>>,
}

impl LifecycleRuntime {
    /// The task stops once every [`RuntimeHandle`] is dropped.
    pub fn spawn(
        manager: UpdateManager,
        hasher: Arc<dyn ContentHasher>,
    ) -> (RuntimeHandle, JoinHandle<()>) {
        let (sender, commands) = mpsc::unbounded_channel();
        let runtime = Self {
            manager,
            hasher,
            commands,
            loopback: sender.downgrade(),
            binary_waiters: Vec::new(),
        };
        let task = tokio::spawn(runtime.run());
        (RuntimeHandle { sender }, task)
    }

    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            self.handle(command);
        }
        tracing::debug!("lifecycle runtime stopped");
    }

    fn handle(&mut self, command: LifecycleCommand) {
        match command {
            LifecycleCommand::Install {
                package,
                options,
                reply,
            } => {
                let result = self.manager.install(package, options);
                let _ = reply.send(self.finish(result));
            }
            LifecycleCommand::Foreground { reply } => {
                let result = self.manager.on_foreground(Instant::now().into_std());
                let _ = reply.send(self.finish(result));
            }
            LifecycleCommand::Background => {
                self.manager.on_background(Instant::now().into_std());
            }
            LifecycleCommand::Confirm { reply } => {
                let result = self.manager.confirm();
                let _ = reply.send(self.finish(result));
            }
            LifecycleCommand::Attach => self.manager.attach(),
            LifecycleCommand::Teardown => self.manager.teardown(),
            LifecycleCommand::PageFinished => {
                self.manager.page_finished();
            }
            LifecycleCommand::TimerExpired { generation } => {
                let result = self.manager.timer_expired(generation);
                if let Err(err) = self.finish(result) {
                    tracing::warn!(error = %err, "rollback after timer expiry failed");
                }
            }
            LifecycleCommand::IsFirstRun {
                package_hash,
                reply,
            } => {
                let _ = reply.send(self.manager.is_first_run(&package_hash));
            }
            LifecycleCommand::IsFailedUpdate {
                package_hash,
                reply,
            } => {
                let _ = reply.send(self.manager.is_failed_update(package_hash.as_deref()));
            }
            LifecycleCommand::ClearFailedUpdates { reply } => {
                let _ = reply.send(self.manager.clear_failed_updates());
            }
            LifecycleCommand::ComputeHash { root, reply } => {
                self.spawn_hash(root, HashTarget::Caller(reply));
            }
            LifecycleCommand::BinaryHash { reply } => {
                if let Some(cached) = self.manager.preferences().cached_binary_hash() {
                    let _ = reply.send(Ok(cached));
                    return;
                }
                match self.manager.bundled_content_dir() {
                    Some(root) => {
                        let root = root.to_path_buf();
                        let in_flight = !self.binary_waiters.is_empty();
                        self.binary_waiters.push(reply);
                        if in_flight {
                            tracing::debug!("joining in-flight binary hash");
                        } else {
                            self.spawn_hash(root, HashTarget::BinaryWaiters);
                        }
                    }
                    None => {
                        let _ = reply.send(Err(anyhow!(
                            "binary hash unavailable: no bundled content directory configured"
                        )));
                    }
                }
            }
            LifecycleCommand::HashComputed { result, target } => {
                self.deliver_hash(result, target);
            }
            LifecycleCommand::Status { reply } => {
                let _ = reply.send(self.manager.status());
            }
        }
    }

    /// Fires the navigation and arms the timer of a committed outcome.
    fn finish(&mut self, result: Result<Outcome>) -> Result<Option<Transition>> {
        let outcome = result?;
        if let Some(navigation) = outcome.navigation {
            let host = self.manager.host();
            navigation.fire(host.as_ref());
        }
        if let Some(timer) = outcome.timer {
            let loopback = self.loopback.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timer.delay).await;
                if let Some(sender) = loopback.upgrade() {
                    let _ = sender.send(LifecycleCommand::TimerExpired {
                        generation: timer.generation,
                    });
                }
            });
        }
        Ok(outcome.transition)
    }

    fn deliver_hash(&mut self, result: Result<String>, target: HashTarget) {
        match target {
            HashTarget::Caller(reply) => {
                let _ = reply.send(result);
            }
            HashTarget::BinaryWaiters => {
                if let Ok(hash) = &result {
                    if let Err(err) = self.manager.preferences().save_binary_hash(hash) {
                        tracing::warn!(error = %err, "failed to cache binary hash");
                    }
                }
                for reply in self.binary_waiters.drain(..) {
                    let shared = match &result {
                        Ok(hash) => Ok(hash.clone()),
                        Err(err) => Err(anyhow!("{err:#}")),
                    };
                    let _ = reply.send(shared);
                }
            }
        }
    }

    fn spawn_hash(&mut self, root: PathBuf, target: HashTarget) {
        let hasher = Arc::clone(&self.hasher);
        let Some(sender) = self.loopback.upgrade() else {
            self.deliver_hash(Err(anyhow!("lifecycle runtime is shutting down")), target);
            return;
        };
        tokio::spawn(async move {
            let result = match tokio::task::spawn_blocking(move || {
                hasher.compute_manifest_hash(&root)
            })
            .await
            {
                Ok(result) => result,
                Err(err) => Err(anyhow!("hash task failed: {err}")),
            };
            let _ = sender.send(LifecycleCommand::HashComputed { result, target });
        });
    }
}

/// Cloneable async front door to a running [`LifecycleRuntime`].
#[derive(Clone)]
pub struct RuntimeHandle {
    sender: UnboundedSender<LifecycleCommand>,
}

impl RuntimeHandle {
    fn send(&self, command: LifecycleCommand) -> Result<()> {
        self.sender
            .send(command)
            .map_err(|_| anyhow!("lifecycle runtime is not running"))
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> LifecycleCommand,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.send(build(reply))?;
        response
            .await
            .map_err(|_| anyhow!("lifecycle runtime dropped the request"))
    }

    pub async fn install(
        &self,
        package: PackageMetadata,
        options: InstallOptions,
    ) -> Result<Option<Transition>> {
        self.request(|reply| LifecycleCommand::Install {
            package,
            options,
            reply,
        })
        .await?
    }

    pub async fn foreground(&self) -> Result<Option<Transition>> {
        self.request(|reply| LifecycleCommand::Foreground { reply })
            .await?
    }

    pub fn background(&self) -> Result<()> {
        self.send(LifecycleCommand::Background)
    }

    pub async fn confirm(&self) -> Result<Option<Transition>> {
        self.request(|reply| LifecycleCommand::Confirm { reply })
            .await?
    }

    pub fn attach(&self) -> Result<()> {
        self.send(LifecycleCommand::Attach)
    }

    pub fn teardown(&self) -> Result<()> {
        self.send(LifecycleCommand::Teardown)
    }

    pub fn page_finished(&self) -> Result<()> {
        self.send(LifecycleCommand::PageFinished)
    }

    pub async fn is_first_run(&self, package_hash: impl Into<String>) -> Result<bool> {
        let package_hash = package_hash.into();
        self.request(|reply| LifecycleCommand::IsFirstRun {
            package_hash,
            reply,
        })
        .await
    }

    pub async fn is_failed_update(&self, package_hash: Option<String>) -> Result<bool> {
        self.request(|reply| LifecycleCommand::IsFailedUpdate {
            package_hash,
            reply,
        })
        .await
    }

    pub async fn clear_failed_updates(&self) -> Result<()> {
        self.request(|reply| LifecycleCommand::ClearFailedUpdates { reply })
            .await?
    }

    pub async fn compute_hash(&self, root: impl Into<PathBuf>) -> Result<String> {
        let root = root.into();
        self.request(|reply| LifecycleCommand::ComputeHash { root, reply })
            .await?
    }

    pub async fn binary_hash(&self) -> Result<String> {
        self.request(|reply| LifecycleCommand::BinaryHash { reply })
            .await?
    }

    pub async fn status(&self) -> Result<StatusSnapshot> {
        self.request(|reply| LifecycleCommand::Status { reply })
            .await
    }
}
