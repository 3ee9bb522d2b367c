use super::notify::Notifier;
use super::orchestrator::UploadOrchestrator;
use super::progress::{progress_channel, ChannelSettings, ObserverHandle};
use crate::api::auth::TokenProvider;
use crate::api::drive::{ProgressSink, ProgressTick, UploadOutcome};
use crate::config::Config;
use crate::error::UploadError;
use crate::messages::InboundCommand;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// 接收 UI 的上传命令，为每个命令起一个独立的运行。
#[derive(Clone)]
pub struct UploadManager {
    orchestrator: Arc<UploadOrchestrator>,
    notifier: Arc<dyn Notifier>,
    settings: ChannelSettings,
}

/// 一次提交的两个出口：观察者用来接收进度与结果，
/// completion 不论结果以哪种方式交付都会给出最终结果。
pub struct UploadTicket {
    pub observer: ObserverHandle,
    pub completion: JoinHandle<UploadOutcome>,
}

impl UploadManager {
    pub fn new(
        orchestrator: UploadOrchestrator,
        notifier: Arc<dyn Notifier>,
        settings: ChannelSettings,
    ) -> Self {
        UploadManager {
            orchestrator: Arc::new(orchestrator),
            notifier,
            settings,
        }
    }

    pub fn from_config(
        config: &Config,
        tokens: Arc<dyn TokenProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, UploadError> {
        let orchestrator = UploadOrchestrator::from_config(config, tokens)?;
        Ok(Self::new(orchestrator, notifier, config.channel_settings()))
    }

    /// 在当前 tokio 运行时上启动一次上传。没有取消入口：运行一定会走到终态。
    pub fn submit(&self, command: InboundCommand) -> UploadTicket {
        let (channel, observer) =
            progress_channel(self.settings.clone(), Arc::clone(&self.notifier));
        let channel = Arc::new(channel);

        let sink_channel = Arc::clone(&channel);
        let sink: ProgressSink = Arc::new(move |tick: ProgressTick| sink_channel.tick(tick));

        let orchestrator = Arc::clone(&self.orchestrator);
        let InboundCommand::PutFileOnGoogleDrive { file } = command;
        let completion = tokio::spawn(async move {
            let outcome = orchestrator.run(file, sink).await;
            let mode = channel.finish(&outcome).await;
            debug!(?mode, succeeded = outcome.succeeded, "outcome delivered");
            outcome
        });

        UploadTicket {
            observer,
            completion,
        }
    }
}
