//! In-process run of one broker and several contexts.

use anyhow::{Context, Result, anyhow};
use ratesync_config::RuntimeConfig;
use ratesync_contracts::events::KeyPress;
use ratesync_core::{
    agent::ControlAgent,
    broker::SyncBroker,
    infra::{BrokerHandle, ContextHub, MemoryDocument, MemoryStore},
    ports::{BrokerClient, ContextChannel},
    protocol::{ContextId, ContextMessage, wire},
};
use ratesync_model::{
    HotkeyAction, KeyCombo, PlaybackState, Settings, format_speed,
    speeds_equal,
};
use std::{fmt, str::FromStr, sync::Arc, time::Duration};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

const SETTLE: Duration = Duration::from_millis(25);

/// One scripted step, applied by the first context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Hotkey(HotkeyAction),
    Set(f64),
}

impl FromStr for Step {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "increase" => Ok(Step::Hotkey(HotkeyAction::Increase)),
            "decrease" => Ok(Step::Hotkey(HotkeyAction::Decrease)),
            "toggle" => Ok(Step::Hotkey(HotkeyAction::Toggle)),
            other => other
                .strip_prefix("set:")
                .and_then(|speed| speed.parse::<f64>().ok())
                .filter(|speed| speed.is_finite())
                .map(Step::Set)
                .ok_or_else(|| {
                    format!(
                        "unknown action '{other}', expected increase, \
                         decrease, toggle or set:<speed>"
                    )
                }),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Hotkey(action) => write!(f, "{action}"),
            Step::Set(speed) => write!(f, "set:{speed}"),
        }
    }
}

impl Step {
    fn expected(
        &self,
        state: &PlaybackState,
        settings: &Settings,
    ) -> PlaybackState {
        match self {
            Step::Hotkey(HotkeyAction::Increase) => {
                state.stepped(settings.effective_increment())
            }
            Step::Hotkey(HotkeyAction::Decrease) => {
                state.stepped(-settings.effective_increment())
            }
            Step::Hotkey(HotkeyAction::Toggle) => state.toggled(),
            Step::Set(speed) => state.transition(*speed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub contexts: usize,
    pub videos: usize,
    pub steps: Vec<Step>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ContextReport {
    pub id: ContextId,
    pub state: PlaybackState,
    pub media_rates: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub expected: PlaybackState,
    pub broker_state: PlaybackState,
    pub contexts: Vec<ContextReport>,
    /// Every message the hub delivered, as wire text.
    pub deliveries: Vec<(ContextId, String)>,
}

impl SimulationReport {
    pub fn converged(&self) -> bool {
        self.broker_state.same_as(&self.expected)
            && self.contexts.iter().all(|context| {
                context.state.same_as(&self.expected)
                    && context.media_rates.iter().all(|rate| {
                        speeds_equal(*rate, self.expected.current_speed)
                    })
            })
    }
}

struct Participant {
    id: ContextId,
    document: Arc<MemoryDocument>,
    observer: watch::Receiver<PlaybackState>,
}

fn press_for(combo: &str) -> Option<KeyPress> {
    let combo: KeyCombo = combo.parse().ok()?;
    Some(KeyPress {
        code: combo.code,
        ctrl: combo.ctrl,
        meta: combo.meta,
        alt: combo.alt,
        shift: combo.shift,
        ..KeyPress::default()
    })
}

async fn wait_for(
    participant: &Participant,
    speed: f64,
    timeout: Duration,
) -> Result<()> {
    let mut observer = participant.observer.clone();
    tokio::time::timeout(
        timeout,
        observer.wait_for(|state| speeds_equal(state.current_speed, speed)),
    )
    .await
    .with_context(|| format!("{} did not reach {speed}", participant.id))??;
    Ok(())
}

pub async fn run(
    config: &RuntimeConfig,
    plan: &SimulationPlan,
) -> Result<SimulationReport> {
    if plan.contexts == 0 {
        return Err(anyhow!("at least one context is required"));
    }

    let store = Arc::new(MemoryStore::new(config.store_channel_capacity));
    let hub = ContextHub::new(config.context_mailbox_capacity);
    let mut tap = hub.subscribe_deliveries();

    let broker = SyncBroker::new(store.clone(), Arc::new(hub.clone()))
        .with_seed_settings(config.settings.clone());
    let init = broker.initialize().await?;
    debug!("Broker initialization: {:?}", init);
    let (handle, requests) = BrokerHandle::channel(config.broker_queue_capacity);
    tokio::spawn(broker.run(requests));

    let mut participants = Vec::with_capacity(plan.contexts);
    for _ in 0..plan.contexts {
        let (document, events) = MemoryDocument::new();
        for _ in 0..plan.videos {
            document.add_media();
        }
        let (id, inbox) = hub.register();
        let mut agent = ControlAgent::new(
            id,
            document.clone(),
            Arc::new(handle.clone()),
            store.clone(),
        );
        agent.init().await;
        let observer = agent.observe();
        tokio::spawn(agent.run(inbox, events));
        participants.push(Participant {
            id,
            document,
            observer,
        });
    }
    info!("Simulating {} contexts", participants.len());

    let snapshot = handle.get_state(None).await?;
    let settings = snapshot.settings;
    let mut expected = snapshot.state;
    let driver = &participants[0];

    for step in &plan.steps {
        expected = step.expected(&expected, &settings);
        let press = match step {
            Step::Hotkey(action) => press_for(settings.hotkeys.get(*action)),
            Step::Set(_) => None,
        };
        match press {
            Some(press) => driver.document.press_key(press),
            None => {
                hub.send(
                    driver.id,
                    ContextMessage::SetSpeed {
                        speed: expected.current_speed,
                    },
                )
                .await?
            }
        }
        debug!("{} -> {}", step, format_speed(expected.current_speed));

        // Let echoes of this step drain before the next one starts.
        for participant in &participants {
            wait_for(participant, expected.current_speed, plan.timeout).await?;
        }
        tokio::time::sleep(SETTLE).await;
    }

    for participant in &participants {
        wait_for(participant, expected.current_speed, plan.timeout).await?;
    }
    let broker_state = handle.get_state(None).await?.state;

    let contexts = participants
        .iter()
        .map(|participant| ContextReport {
            id: participant.id,
            state: *participant.observer.borrow(),
            media_rates: participant
                .document
                .media_ids()
                .into_iter()
                .filter_map(|id| participant.document.rate_of(id))
                .collect(),
        })
        .collect();

    let mut deliveries = Vec::new();
    loop {
        match tap.try_recv() {
            Ok((context, message)) => {
                deliveries.push((context, wire::encode(&message)?))
            }
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                debug!("Delivery tap skipped {} messages", skipped);
            }
            Err(_) => break,
        }
    }

    Ok(SimulationReport {
        expected,
        broker_state,
        contexts,
        deliveries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_parse() {
        assert_eq!(
            "increase".parse::<Step>(),
            Ok(Step::Hotkey(HotkeyAction::Increase))
        );
        assert_eq!("set:1.75".parse::<Step>(), Ok(Step::Set(1.75)));
        assert!("set:fast".parse::<Step>().is_err());
        assert!("reboot".parse::<Step>().is_err());
    }

    #[test]
    fn bound_combo_becomes_key_press() {
        let press = press_for("Ctrl+Shift+KeyS").unwrap();
        assert_eq!(press, KeyPress::new("KeyS").ctrl().shift());
        assert!(press_for("").is_none());
    }

    #[tokio::test]
    async fn simulation_converges() {
        let plan = SimulationPlan {
            contexts: 3,
            videos: 2,
            steps: vec![
                Step::Hotkey(HotkeyAction::Increase),
                Step::Hotkey(HotkeyAction::Toggle),
                Step::Hotkey(HotkeyAction::Toggle),
                Step::Set(1.75),
            ],
            timeout: Duration::from_secs(2),
        };

        let report = run(&RuntimeConfig::default(), &plan).await.unwrap();

        assert!(report.converged(), "{report:?}");
        assert_eq!(report.expected, PlaybackState::new(1.75, 1.75));
        assert_eq!(report.contexts.len(), 3);
        assert!(!report.deliveries.is_empty());
    }

    #[tokio::test]
    async fn unbound_hotkey_falls_back_to_set_speed() {
        let mut config = RuntimeConfig::default();
        config.settings.hotkeys.increase = String::new();
        let plan = SimulationPlan {
            contexts: 2,
            videos: 1,
            steps: vec![Step::Hotkey(HotkeyAction::Increase)],
            timeout: Duration::from_secs(2),
        };

        let report = run(&config, &plan).await.unwrap();

        assert!(report.converged());
        assert_eq!(report.expected.current_speed, 1.1);
    }
}
