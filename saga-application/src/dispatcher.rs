//! 消息调度器（MessageDispatcher）
//!
//! 按消息类型把入站消息分发给订阅它的处理器：
//! - 同一消息的多个处理器依次执行，互不影响；
//! - 处理器的错误与 panic 都在调度边界被捕获并记录；
//! - 作为长驻任务运行时，以有界并发消费传输端的消息流，
//!   处理完成后确认或拒绝，并提供关闭与等待的 `DispatcherHandle`。
//!
use crate::context::Envelope;
use crate::error::ProcessingStage;
use crate::processor::{HandledMessages, MessageProcessor, ProcessingOutcome};
use crate::transport::InboundTransport;
use bon::Builder;
use futures_util::{FutureExt, StreamExt};
use serde::Deserialize;
use std::any::TypeId;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// 导入由 bon::Builder 生成的 typestate 模块与状态转换别名
use self::message_dispatcher_builder::{IsUnset, SetRegistry, State as BuilderState};

#[derive(Builder)]
pub struct MessageDispatcher {
    #[builder(setters(vis = "pub(crate)"))]
    registry: ProcessorRegistry,
    #[builder(default)]
    config: DispatcherConfig,
}

impl<S: BuilderState> MessageDispatcherBuilder<S> {
    pub fn processors(
        self,
        processors: Vec<Arc<dyn MessageProcessor>>,
    ) -> MessageDispatcherBuilder<SetRegistry<S>>
    where
        <S as BuilderState>::Registry: IsUnset,
    {
        self.registry(ProcessorRegistry::new(processors))
    }
}

impl MessageDispatcher {
    pub fn config(&self) -> DispatcherConfig {
        self.config
    }

    /// 把一条消息交给所有订阅它的处理器
    pub async fn dispatch(&self, envelope: &Envelope) -> DispatchReport {
        let mut report = DispatchReport::default();

        for processor in self.registry.matching(envelope.message_type_id()) {
            let name = processor.processor_name().to_string();
            let result = AssertUnwindSafe(processor.process(envelope))
                .catch_unwind()
                .await;

            match result {
                Ok(Ok(ProcessingOutcome::Handled { .. })) => report.handled += 1,
                Ok(Ok(ProcessingOutcome::SagaNotFound { .. })) => report.not_found += 1,
                Ok(Ok(ProcessingOutcome::Ignored)) => report.ignored += 1,
                Ok(Err(err)) => {
                    tracing::error!(
                        processor = %name,
                        stage = %err.stage(),
                        message_type = err.message_type(),
                        message_id = %envelope.message_id(),
                        identity = ?err.identity().map(ToString::to_string),
                        error = %err.domain_error(),
                        "message processing failed"
                    );
                    report.failures.push(DispatchFailure {
                        processor: name,
                        stage: Some(err.stage()),
                        reason: err.to_string(),
                    });
                }
                Err(_) => {
                    tracing::error!(
                        processor = %name,
                        message_type = envelope.message_name(),
                        message_id = %envelope.message_id(),
                        "message processor panicked"
                    );
                    report.failures.push(DispatchFailure {
                        processor: name,
                        stage: None,
                        reason: "processor panicked".to_string(),
                    });
                }
            }
        }

        report
    }

    /// 启动调度循环，返回可用于关闭/等待的句柄
    pub fn start(self: Arc<Self>, transport: Arc<dyn InboundTransport>) -> DispatcherHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(Self::receive_loop(self, transport, token.clone()));

        DispatcherHandle {
            token,
            tasks: vec![task],
        }
    }

    async fn receive_loop(
        self: Arc<Self>,
        transport: Arc<dyn InboundTransport>,
        token: CancellationToken,
    ) {
        let stream = transport.subscribe().await;
        let concurrency = self.config.concurrency.max(1);

        stream
            .take_until(async move { token.cancelled().await })
            .for_each_concurrent(Some(concurrency), |received| {
                let dispatcher = self.clone();
                let transport = transport.clone();
                async move {
                    let envelope = match received {
                        Ok(envelope) => envelope,
                        Err(err) => {
                            tracing::warn!(error = %err, "inbound transport error");
                            return;
                        }
                    };

                    let report = dispatcher.dispatch(&envelope).await;
                    let settled = if report.is_success() {
                        transport.acknowledge(&envelope).await
                    } else {
                        transport.reject(&envelope, &report.summary()).await
                    };
                    if let Err(err) = settled {
                        tracing::warn!(
                            message_id = %envelope.message_id(),
                            error = %err,
                            "failed to settle inbound message"
                        );
                    }
                }
            })
            .await;
    }
}

#[derive(Clone, Default)]
struct ProcessorRegistry {
    by_type: HashMap<TypeId, Vec<Arc<dyn MessageProcessor>>>,
    all: Vec<Arc<dyn MessageProcessor>>,
}

impl ProcessorRegistry {
    fn new(processors: Vec<Arc<dyn MessageProcessor>>) -> Self {
        let mut by_type: HashMap<TypeId, Vec<Arc<dyn MessageProcessor>>> = HashMap::new();
        let mut all: Vec<Arc<dyn MessageProcessor>> = Vec::new();

        for p in processors {
            match p.handled_messages() {
                HandledMessages::All => all.push(p),
                HandledMessages::One(t) => {
                    by_type.entry(t).or_default().push(p);
                }
                HandledMessages::Many(ts) => {
                    for t in ts {
                        by_type.entry(t).or_default().push(p.clone());
                    }
                }
            }
        }

        Self { by_type, all }
    }

    fn matching(&self, type_id: TypeId) -> Vec<Arc<dyn MessageProcessor>> {
        let mut merged: Vec<Arc<dyn MessageProcessor>> = Vec::new();
        if let Some(list) = self.by_type.get(&type_id) {
            merged.extend(list.iter().cloned());
        }
        merged.extend(self.all.iter().cloned());
        merged
    }
}

/// 单个处理器的失败记录
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchFailure {
    pub processor: String,
    /// panic 时为空
    pub stage: Option<ProcessingStage>,
    pub reason: String,
}

/// 一条消息的分发结果
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub handled: usize,
    pub not_found: usize,
    pub ignored: usize,
    pub failures: Vec<DispatchFailure>,
}

impl DispatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// 没有任何处理器接收该消息
    pub fn is_unrouted(&self) -> bool {
        self.handled + self.not_found + self.ignored + self.failures.len() == 0
    }

    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("{}: {}", f.processor, f.reason))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// 调度器配置
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// 同时处理的入站消息数
    pub concurrency: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

/// 调度运行句柄：用于优雅关闭与等待任务结束
pub struct DispatcherHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl DispatcherHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub async fn join(mut self) {
        let tasks = std::mem::take(&mut self.tasks);

        for t in tasks {
            let _ = t.await;
        }
    }
}

impl Drop for DispatcherHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
