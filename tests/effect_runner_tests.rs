//! Reply delivery and side-effect execution against in-memory collaborators.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use fitcoach::bot::{dispatch_reply, process_payment_confirmation, BotContext, Collaborators};
use fitcoach::choice_token::ChoiceSet;
use fitcoach::collaborators::{CompletionProvider, PaymentProvider, PaymentVerification, Transport};
use fitcoach::config::DialogConfig;
use fitcoach::dialogue::DialogState;
use fitcoach::effect::{Reply, SideEffect};
use fitcoach::errors::DownstreamError;
use fitcoach::localization::{t_args_lang, t_lang};
use fitcoach::orchestrator::{EventKind, InboundEvent, Orchestrator};
use fitcoach::session::{Identity, MessageHandle};

#[derive(Debug, Clone, PartialEq)]
struct Delivered {
    identity: Identity,
    text: String,
    with_choices: bool,
}

#[derive(Default)]
struct RecordingTransport {
    delivered: Mutex<Vec<Delivered>>,
    cleared: Mutex<Vec<MessageHandle>>,
    next_id: Mutex<i32>,
}

impl RecordingTransport {
    fn texts(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.text.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn deliver(
        &self,
        identity: Identity,
        text: &str,
        choices: Option<&ChoiceSet>,
    ) -> Result<MessageHandle, DownstreamError> {
        self.delivered.lock().unwrap().push(Delivered {
            identity,
            text: text.to_string(),
            with_choices: choices.is_some(),
        });
        let mut id = self.next_id.lock().unwrap();
        *id += 1;
        Ok(MessageHandle(*id))
    }

    async fn clear_choices(
        &self,
        _identity: Identity,
        message: MessageHandle,
    ) -> Result<(), DownstreamError> {
        self.cleared.lock().unwrap().push(message);
        Ok(())
    }
}

enum CompletionMode {
    Answer(&'static str),
    RateLimited,
    Down,
}

struct FakeCompletion {
    mode: CompletionMode,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl CompletionProvider for FakeCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, DownstreamError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.mode {
            CompletionMode::Answer(text) => Ok(text.to_string()),
            CompletionMode::RateLimited => Err(DownstreamError::RateLimited),
            CompletionMode::Down => Err(DownstreamError::Unavailable("boom".to_string())),
        }
    }
}

struct FakePayment {
    link: Option<&'static str>,
    verification: Option<PaymentVerification>,
}

#[async_trait]
impl PaymentProvider for FakePayment {
    async fn create_payment_link(&self, _identity: Identity) -> Result<String, DownstreamError> {
        self.link
            .map(str::to_string)
            .ok_or_else(|| DownstreamError::PaymentProvider("no link".to_string()))
    }

    async fn verify_payment(&self, _token: &str) -> Result<PaymentVerification, DownstreamError> {
        self.verification
            .clone()
            .ok_or_else(|| DownstreamError::PaymentProvider("unknown checkout".to_string()))
    }
}

struct Harness {
    ctx: BotContext,
    transport: Arc<RecordingTransport>,
    completion: Arc<FakeCompletion>,
}

fn harness(mode: CompletionMode, payment: FakePayment) -> Harness {
    let transport = Arc::new(RecordingTransport::default());
    let completion = Arc::new(FakeCompletion {
        mode,
        prompts: Mutex::new(Vec::new()),
    });
    let collaborators = Collaborators {
        transport: transport.clone(),
        completion: completion.clone(),
        payment: Arc::new(payment),
    };
    let orchestrator = Arc::new(Orchestrator::new(DialogConfig::default()));
    Harness {
        ctx: BotContext::new(orchestrator, collaborators),
        transport,
        completion,
    }
}

fn no_payment() -> FakePayment {
    FakePayment {
        link: None,
        verification: None,
    }
}

async fn reach_payment(orch: &Orchestrator, identity: i64) {
    let mut n = 0;
    let mut send = |kind, payload: &str| {
        n += 1;
        InboundEvent::new(format!("{identity}-{n}"), Identity(identity), kind, payload)
    };
    let events = vec![
        send(EventKind::Command, "/start"),
        send(EventKind::Callback, "sex:female"),
        send(EventKind::Text, "30"),
        send(EventKind::Text, "165"),
        send(EventKind::Text, "60"),
        send(EventKind::Callback, "dia:no"),
        send(EventKind::Callback, "lvl:advanced"),
        send(EventKind::Callback, "gol:muscle_gain"),
        send(EventKind::Callback, "typ:mixed"),
    ];
    for event in events {
        orch.handle_event(event).await;
    }
}

#[tokio::test]
async fn test_plain_reply_is_delivered() {
    let h = harness(CompletionMode::Answer("unused"), no_payment());
    dispatch_reply(&h.ctx, Identity(1), Reply::text("hello")).await.unwrap();

    let delivered = h.transport.delivered.lock().unwrap().clone();
    assert_eq!(
        delivered,
        vec![Delivered {
            identity: Identity(1),
            text: "hello".to_string(),
            with_choices: false,
        }]
    );
    assert!(h.completion.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_stale_keyboard_is_cleared_and_new_one_remembered() {
    let h = harness(CompletionMode::Answer("unused"), no_payment());
    let reply = h
        .ctx
        .orchestrator
        .handle_event(InboundEvent::new("e1", Identity(2), EventKind::Command, "/start"))
        .await
        .unwrap();
    dispatch_reply(&h.ctx, Identity(2), reply).await.unwrap();
    assert!(h.transport.delivered.lock().unwrap()[0].with_choices);

    let reply = h
        .ctx
        .orchestrator
        .handle_event(InboundEvent::new("e2", Identity(2), EventKind::Callback, "sex:male"))
        .await
        .unwrap();
    assert_eq!(reply.clear_choices, Some(MessageHandle(1)));
    dispatch_reply(&h.ctx, Identity(2), reply).await.unwrap();
    assert_eq!(*h.transport.cleared.lock().unwrap(), vec![MessageHandle(1)]);
}

#[tokio::test]
async fn test_payment_link_is_sent() {
    let payment = FakePayment {
        link: Some("https://checkout.example/cs_1"),
        verification: None,
    };
    let h = harness(CompletionMode::Answer("unused"), payment);
    let reply = Reply::text(t_lang("payment-link-preparing", None)).with_effect(SideEffect::CreatePaymentLink);
    dispatch_reply(&h.ctx, Identity(3), reply).await.unwrap();

    let texts = h.transport.texts();
    assert_eq!(texts.len(), 2);
    assert_eq!(
        texts[1],
        t_args_lang("payment-link", &[("url", "https://checkout.example/cs_1")], None)
    );
}

#[tokio::test]
async fn test_payment_link_failure_is_reported() {
    let h = harness(CompletionMode::Answer("unused"), no_payment());
    let reply = Reply::text("").with_effect(SideEffect::CreatePaymentLink);
    dispatch_reply(&h.ctx, Identity(4), reply).await.unwrap();

    assert_eq!(h.transport.texts(), vec![t_lang("payment-link-failed", None)]);
}

#[tokio::test]
async fn test_completion_answer_is_forwarded() {
    let h = harness(CompletionMode::Answer("Stretch daily."), no_payment());
    let reply = Reply::text("").with_effect(SideEffect::RequestCompletion {
        prompt: "question".to_string(),
    });
    dispatch_reply(&h.ctx, Identity(5), reply).await.unwrap();

    assert_eq!(h.transport.texts(), vec!["Stretch daily.".to_string()]);
    assert_eq!(*h.completion.prompts.lock().unwrap(), vec!["question".to_string()]);
}

#[tokio::test]
async fn test_completion_failures_map_to_distinct_notices() {
    let h = harness(CompletionMode::RateLimited, no_payment());
    let reply = Reply::text("").with_effect(SideEffect::RequestCompletion {
        prompt: "q".to_string(),
    });
    dispatch_reply(&h.ctx, Identity(6), reply.clone()).await.unwrap();
    assert_eq!(h.transport.texts(), vec![t_lang("completion-rate-limited", None)]);

    let h = harness(CompletionMode::Down, no_payment());
    dispatch_reply(&h.ctx, Identity(6), reply).await.unwrap();
    assert_eq!(h.transport.texts(), vec![t_lang("completion-failed", None)]);
}

#[tokio::test]
async fn test_plan_delivery_offers_topics() {
    let h = harness(CompletionMode::Answer("Week 1: ..."), no_payment());
    let reply = Reply::text(t_lang("payment-success", None)).with_effect(SideEffect::SendPlan {
        prompt: "plan".to_string(),
    });
    dispatch_reply(&h.ctx, Identity(7), reply).await.unwrap();

    let delivered = h.transport.delivered.lock().unwrap().clone();
    assert_eq!(delivered.len(), 3);
    assert_eq!(delivered[1].text, "Week 1: ...");
    assert_eq!(delivered[2].text, t_lang("plan-followup", None));
    assert!(delivered[2].with_choices);
}

#[tokio::test]
async fn test_plan_failure_is_reported() {
    let h = harness(CompletionMode::Down, no_payment());
    let reply = Reply::text("").with_effect(SideEffect::SendPlan {
        prompt: "plan".to_string(),
    });
    dispatch_reply(&h.ctx, Identity(8), reply).await.unwrap();
    assert_eq!(h.transport.texts(), vec![t_lang("plan-failed", None)]);
}

#[tokio::test]
async fn test_payment_confirmation_completes_session_once() {
    let payment = FakePayment {
        link: None,
        verification: Some(PaymentVerification {
            confirmed: true,
            identity: Some(Identity(9)),
            reference: "cs_live_9".to_string(),
        }),
    };
    let h = harness(CompletionMode::Answer("Your plan"), payment);
    reach_payment(&h.ctx.orchestrator, 9).await;

    process_payment_confirmation(&h.ctx, "cs_live_9").await.unwrap();
    let session = h.ctx.orchestrator.snapshot(Identity(9)).await.unwrap();
    assert_eq!(session.state, DialogState::Complete);
    assert_eq!(session.profile.payment_reference.as_deref(), Some("cs_live_9"));

    let texts = h.transport.texts();
    assert_eq!(texts[0], t_lang("payment-success", None));
    assert_eq!(texts[1], "Your plan");
    assert_eq!(h.completion.prompts.lock().unwrap().len(), 1);

    // A repeated notification sends nothing more
    process_payment_confirmation(&h.ctx, "cs_live_9").await.unwrap();
    assert_eq!(h.transport.texts().len(), texts.len());
    assert_eq!(h.completion.prompts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unpaid_confirmation_is_rejected() {
    let payment = FakePayment {
        link: None,
        verification: Some(PaymentVerification {
            confirmed: false,
            identity: Some(Identity(10)),
            reference: "cs_open".to_string(),
        }),
    };
    let h = harness(CompletionMode::Answer("unused"), payment);
    reach_payment(&h.ctx.orchestrator, 10).await;

    assert!(process_payment_confirmation(&h.ctx, "cs_open").await.is_err());
    let session = h.ctx.orchestrator.snapshot(Identity(10)).await.unwrap();
    assert_eq!(session.state, DialogState::Payment);
    assert!(h.transport.texts().is_empty());
}

#[tokio::test]
async fn test_unknown_checkout_is_an_error() {
    let h = harness(CompletionMode::Answer("unused"), no_payment());
    assert!(process_payment_confirmation(&h.ctx, "cs_missing").await.is_err());
}
