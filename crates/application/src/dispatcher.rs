//! 消息扇出
//!
//! 对解析出的每个接收者并发推送，单个接收者失败只记录日志，不影响其他接收者。
//! 推送的发出由信号量限速：许可数为 1 时，上一次推送发出之后才会发出下一次，
//! 已发出的推送在后台继续完成，不占用许可。

use std::sync::Arc;
use std::time::Duration;

use domain::{ChatMessage, MessageId, PushChatRequest, UserId};
use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::dead_letter::{DeadLetter, DeadLetterSink};
use crate::gateway::{GatewayClient, GatewayError, GatewayLocator};
use crate::recipient::RecipientResolver;

#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    /// 同时处于“正在发出”状态的推送数量上限
    pub max_in_flight: usize,
    pub send_timeout: Duration,
}

impl From<&config::DispatchConfig> for DispatchSettings {
    fn from(value: &config::DispatchConfig) -> Self {
        Self {
            max_in_flight: value.max_in_flight.max(1),
            send_timeout: value.send_timeout(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_in_flight: 1,
            send_timeout: Duration::from_secs(3),
        }
    }
}

/// 一次扇出的最终结果；只用于日志和测试，不会返回给发送者
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// 解析出的接收者数量，解析失败时为 `None`
    pub recipients: Option<usize>,
    pub delivered: usize,
    pub failed: usize,
}

impl DispatchReport {
    /// 每个接收者都已尝试过一次
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// 所有推送都已发出的扇出
///
/// 丢弃它不会取消后台推送，失败仍然进入死信记录。
#[derive(Debug)]
pub struct Dispatch {
    recipients: Option<usize>,
    sends: Vec<JoinHandle<bool>>,
}

impl Dispatch {
    pub fn recipients(&self) -> Option<usize> {
        self.recipients
    }

    pub fn issued(&self) -> usize {
        self.sends.len()
    }

    /// 等待每个推送成功、失败或超时
    pub async fn settled(self) -> DispatchReport {
        let mut report = DispatchReport {
            recipients: self.recipients,
            ..Default::default()
        };
        for send in self.sends {
            match send.await {
                Ok(true) => report.delivered += 1,
                Ok(false) => report.failed += 1,
                Err(join_err) => {
                    report.failed += 1;
                    tracing::error!(error = %join_err, "推送任务异常退出");
                }
            }
        }
        report
    }
}

pub struct DeliveryDispatcher {
    resolver: RecipientResolver,
    locator: Arc<dyn GatewayLocator>,
    client: Arc<dyn GatewayClient>,
    dead_letters: Arc<dyn DeadLetterSink>,
    permits: Arc<Semaphore>,
    send_timeout: Duration,
}

impl DeliveryDispatcher {
    pub fn new(
        resolver: RecipientResolver,
        locator: Arc<dyn GatewayLocator>,
        client: Arc<dyn GatewayClient>,
        dead_letters: Arc<dyn DeadLetterSink>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            resolver,
            locator,
            client,
            dead_letters,
            permits: Arc::new(Semaphore::new(settings.max_in_flight.max(1))),
            send_timeout: settings.send_timeout,
        }
    }

    /// 把消息推送给所有接收者，返回时每个推送都已发出（不保证已被确认）
    pub async fn push_chat_message(&self, message: &ChatMessage) -> Dispatch {
        let targets = match self.resolver.resolve(message).await {
            Ok(targets) => targets,
            Err(err) => {
                tracing::error!(
                    room_id = %message.to,
                    message_id = %message.id,
                    error = %err,
                    "解析接收者失败，消息丢弃"
                );
                self.dead_letters.record(DeadLetter::Unresolved {
                    message_id: message.id,
                    room_id: message.to,
                    reason: err.to_string(),
                });
                return Dispatch {
                    recipients: None,
                    sends: Vec::new(),
                };
            }
        };

        let recipients = targets.len();
        let mut sends = Vec::with_capacity(recipients);
        let mut signals = Vec::with_capacity(recipients);

        for target in targets {
            // 拿到许可才启动下一个推送任务
            let permit = match Arc::clone(&self.permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::error!("推送信号量已关闭");
                    break;
                }
            };
            let (issued_tx, issued_rx) = oneshot::channel();
            signals.push(issued_rx);

            let worker = SendWorker {
                locator: Arc::clone(&self.locator),
                client: Arc::clone(&self.client),
                dead_letters: Arc::clone(&self.dead_letters),
                message_id: message.id,
                request: PushChatRequest {
                    message: message.clone(),
                    target,
                },
                timeout: self.send_timeout,
            };
            sends.push(tokio::spawn(worker.run(permit, issued_tx)));
        }

        // 发送端被丢弃说明推送在发出前就失败了，同样算作已尝试
        for signal in signals {
            let _ = signal.await;
        }

        tracing::debug!(
            message_id = %message.id,
            recipients,
            issued = sends.len(),
            "扇出已全部发出"
        );
        Dispatch {
            recipients: Some(recipients),
            sends,
        }
    }
}

struct SendWorker {
    locator: Arc<dyn GatewayLocator>,
    client: Arc<dyn GatewayClient>,
    dead_letters: Arc<dyn DeadLetterSink>,
    message_id: MessageId,
    request: PushChatRequest,
    timeout: Duration,
}

impl SendWorker {
    /// 返回是否推送成功；失败写入死信
    async fn run(self, permit: OwnedSemaphorePermit, issued: oneshot::Sender<()>) -> bool {
        let target = self.request.target;
        let outcome = self.send(permit, issued).await;
        match outcome {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    message_id = %self.message_id,
                    target = %target,
                    error = %err,
                    "推送到网关失败，跳过该接收者"
                );
                self.dead_letters.record(DeadLetter::Delivery {
                    message_id: self.message_id,
                    target,
                    reason: err.to_string(),
                });
                false
            }
        }
    }

    async fn send(
        &self,
        permit: OwnedSemaphorePermit,
        issued: oneshot::Sender<()>,
    ) -> Result<(), GatewayError> {
        let target: UserId = self.request.target;
        let addr = tokio::time::timeout(self.timeout, self.locator.locate(target))
            .await
            .map_err(|_| GatewayError::Timeout)??;
        let url = addr.chat_url();
        tracing::debug!(target = %target, url = %url, "推送到网关");

        let client = Arc::clone(&self.client);
        let request = self.request.clone();
        let timeout = self.timeout;
        let push = tokio::spawn(async move {
            tokio::time::timeout(timeout, client.push(&url, &request)).await
        });

        // 已发出：归还许可，通知发出循环
        drop(permit);
        let _ = issued.send(());

        match push.await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(GatewayError::Timeout),
            Err(join_err) => Err(GatewayError::Transport(join_err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayAddr, MockGatewayClient, MockGatewayLocator, StaticGatewayLocator};
    use crate::memory::{InMemoryStore, MemoryDeadLetterSink};
    use async_trait::async_trait;
    use chrono::Utc;
    use domain::{
        Group, GroupId, GroupMember, GroupRepository, MessageContent, MessageId, Room, RoomId,
        RoomRepository,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    async fn group_with_members(store: &InMemoryStore, members: &[UserId]) -> Group {
        let group = Group::new(GroupId::generate(), "team", members[0], Utc::now()).unwrap();
        GroupRepository::create(store, group.clone()).await.unwrap();
        for uid in &members[1..] {
            store
                .add_member(GroupMember {
                    group_id: group.group_id,
                    uid: *uid,
                    joined_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        RoomRepository::create(store, Room::for_group(group.group_id))
            .await
            .unwrap();
        group
    }

    fn message(from: UserId, to: RoomId) -> ChatMessage {
        ChatMessage::new(
            MessageId::generate(),
            from,
            to,
            MessageContent::text("hi all"),
            "text",
            Utc::now(),
        )
        .unwrap()
    }

    fn dispatcher(
        store: Arc<InMemoryStore>,
        locator: Arc<dyn GatewayLocator>,
        client: Arc<dyn GatewayClient>,
        sink: Arc<MemoryDeadLetterSink>,
        settings: DispatchSettings,
    ) -> DeliveryDispatcher {
        DeliveryDispatcher::new(
            RecipientResolver::new(store.clone(), store),
            locator,
            client,
            sink,
            settings,
        )
    }

    fn static_locator() -> Arc<dyn GatewayLocator> {
        Arc::new(StaticGatewayLocator::new(GatewayAddr::new("gate", 8080)))
    }

    #[tokio::test]
    async fn failing_recipient_does_not_block_others() {
        let store = Arc::new(InMemoryStore::new());
        let members = [UserId::generate(), UserId::generate(), UserId::generate()];
        let group = group_with_members(&store, &members).await;
        let unreachable = members[1];

        let mut locator = MockGatewayLocator::new();
        locator.expect_locate().returning(move |target| {
            if target == unreachable {
                Err(GatewayError::NoRoute(target))
            } else {
                Ok(GatewayAddr::new("gate", 8080))
            }
        });

        let pushed = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&pushed);
        let mut client = MockGatewayClient::new();
        client.expect_push().times(2).returning(move |url, request| {
            assert_eq!(url, "http://gate:8080/chat");
            seen.lock().unwrap().push(request.target);
            Ok(())
        });

        let sink = Arc::new(MemoryDeadLetterSink::default());
        let dispatcher = dispatcher(
            store,
            Arc::new(locator),
            Arc::new(client),
            sink.clone(),
            DispatchSettings::default(),
        );

        let report = dispatcher
            .push_chat_message(&message(members[0], group.room_id()))
            .await
            .settled()
            .await;

        assert_eq!(report.recipients, Some(3));
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        let pushed = pushed.lock().unwrap();
        assert!(pushed.contains(&members[0]));
        assert!(pushed.contains(&members[2]));

        let letters = sink.letters();
        assert_eq!(letters.len(), 1);
        assert!(matches!(
            &letters[0],
            DeadLetter::Delivery { target, .. } if *target == unreachable
        ));
    }

    #[tokio::test]
    async fn unknown_room_makes_zero_attempts() {
        let store = Arc::new(InMemoryStore::new());
        let mut client = MockGatewayClient::new();
        client.expect_push().never();
        let sink = Arc::new(MemoryDeadLetterSink::default());
        let dispatcher = dispatcher(
            store,
            static_locator(),
            Arc::new(client),
            sink.clone(),
            DispatchSettings::default(),
        );

        let dispatch = dispatcher
            .push_chat_message(&message(UserId::generate(), RoomId::generate()))
            .await;
        assert_eq!(dispatch.issued(), 0);

        let report = dispatch.settled().await;
        assert_eq!(report, DispatchReport::default());
        assert_eq!(report.attempted(), 0);
        assert_eq!(sink.letters()[0].kind(), "unresolved");
    }

    /// 记录同时在途的调用数量
    #[derive(Default)]
    struct Gauge {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Gauge {
        fn enter(&self) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn leave(&self) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    struct SlowLocator {
        gauge: Gauge,
        delay: Duration,
    }

    #[async_trait]
    impl GatewayLocator for SlowLocator {
        async fn locate(&self, _target: UserId) -> Result<GatewayAddr, GatewayError> {
            self.gauge.enter();
            tokio::time::sleep(self.delay).await;
            self.gauge.leave();
            Ok(GatewayAddr::new("gate", 8080))
        }
    }

    struct SlowClient {
        gauge: Gauge,
        delay: Duration,
    }

    #[async_trait]
    impl GatewayClient for SlowClient {
        async fn push(&self, _url: &str, _request: &PushChatRequest) -> Result<(), GatewayError> {
            self.gauge.enter();
            tokio::time::sleep(self.delay).await;
            self.gauge.leave();
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn issuance_is_paced_but_sends_overlap() {
        let store = Arc::new(InMemoryStore::new());
        let members: Vec<UserId> = (0..4).map(|_| UserId::generate()).collect();
        let group = group_with_members(&store, &members).await;
        let locator = Arc::new(SlowLocator {
            gauge: Gauge::default(),
            delay: Duration::from_millis(20),
        });
        let client = Arc::new(SlowClient {
            gauge: Gauge::default(),
            delay: Duration::from_millis(100),
        });

        let dispatcher = dispatcher(
            store,
            locator.clone(),
            client.clone(),
            Arc::new(MemoryDeadLetterSink::default()),
            DispatchSettings {
                max_in_flight: 1,
                send_timeout: Duration::from_secs(1),
            },
        );

        let dispatch = dispatcher
            .push_chat_message(&message(members[0], group.room_id()))
            .await;
        assert_eq!(dispatch.issued(), 4);

        let report = dispatch.settled().await;
        assert_eq!(report.delivered, 4);
        // 一次只发出一个，但已发出的推送在后台并行
        assert_eq!(locator.gauge.peak(), 1);
        assert!(client.gauge.peak() > 1);
    }

    /// 对指定接收者永不返回，记录其余接收者被推送的时间
    struct HangingClient {
        hung: UserId,
        started: tokio::time::Instant,
        issued_after: Mutex<Vec<(UserId, Duration)>>,
    }

    #[async_trait]
    impl GatewayClient for HangingClient {
        async fn push(&self, _url: &str, request: &PushChatRequest) -> Result<(), GatewayError> {
            self.issued_after
                .lock()
                .unwrap()
                .push((request.target, self.started.elapsed()));
            if request.target == self.hung {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_recipient_does_not_delay_the_others() {
        let store = Arc::new(InMemoryStore::new());
        let members = [UserId::generate(), UserId::generate(), UserId::generate()];
        let group = group_with_members(&store, &members).await;
        let client = Arc::new(HangingClient {
            hung: members[0],
            started: tokio::time::Instant::now(),
            issued_after: Mutex::new(Vec::new()),
        });
        let sink = Arc::new(MemoryDeadLetterSink::default());
        let dispatcher = dispatcher(
            store,
            static_locator(),
            client.clone(),
            sink.clone(),
            DispatchSettings::default(),
        );

        let started = tokio::time::Instant::now();
        let dispatch = dispatcher
            .push_chat_message(&message(members[0], group.room_id()))
            .await;
        assert_eq!(dispatch.issued(), 3);
        assert!(started.elapsed() < Duration::from_secs(1));

        // 给后台推送任务运行的机会
        tokio::time::sleep(Duration::from_millis(1)).await;
        let issued = client.issued_after.lock().unwrap().clone();
        assert_eq!(issued.len(), 3);
        assert!(issued
            .iter()
            .all(|(_, after)| *after < Duration::from_secs(1)));

        let report = dispatch.settled().await;
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert!(matches!(
            &sink.letters()[0],
            DeadLetter::Delivery { target, .. } if *target == members[0]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_gateway_is_bounded_by_send_timeout() {
        let store = Arc::new(InMemoryStore::new());
        let members = [UserId::generate(), UserId::generate()];
        let group = group_with_members(&store, &members).await;
        let client = Arc::new(SlowClient {
            gauge: Gauge::default(),
            delay: Duration::from_secs(30),
        });
        let sink = Arc::new(MemoryDeadLetterSink::default());

        let dispatcher = dispatcher(
            store,
            static_locator(),
            client,
            sink.clone(),
            DispatchSettings {
                max_in_flight: 2,
                send_timeout: Duration::from_millis(30),
            },
        );

        let report = dispatcher
            .push_chat_message(&message(members[0], group.room_id()))
            .await
            .settled()
            .await;
        assert_eq!(report.failed, 2);
        assert!(sink
            .letters()
            .iter()
            .all(|letter| matches!(letter, DeadLetter::Delivery { reason, .. } if reason.contains("timed out"))));
    }
}
