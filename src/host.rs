//! StatusNotifierItem host: watches the session bus for application tray
//! items and forwards them as messages.

use std::collections::HashMap;
use std::future;
use std::sync::Arc;

use iced::futures::channel::mpsc as iced_mpsc;
use iced::futures::SinkExt;
use iced::{stream, Subscription};
use system_tray::client::{ActivateRequest, Client, Event, UpdateEvent};
use system_tray::item::StatusNotifierItem;
use system_tray::menu::TrayMenu;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::item::SniState;
use crate::menu::{self, MenuItem};

#[derive(Debug, Clone)]
pub enum HostMessage {
    /// Requests sent here are forwarded to the owning application.
    ActivateChannelReady(mpsc::Sender<ActivateRequest>),
    ItemAdded { address: String, state: SniState },
    ItemUpdated { address: String, state: SniState },
    MenuUpdated { address: String, items: Vec<MenuItem> },
    ItemRemoved(String),
}

/// Subscribe to tray item events on the session bus.
pub fn subscription() -> Subscription<HostMessage> {
    Subscription::run_with_id("sni-host-events", stream::channel(100, run_host))
}

type Items = HashMap<String, (StatusNotifierItem, Option<TrayMenu>)>;

/// Clone what is needed out of the client's item table without holding the
/// lock across an await.
fn snapshot<T>(client: &Client, f: impl FnOnce(&Items) -> T) -> T {
    let items = client.items();
    let guard = match items.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("tray item table lock poisoned");
            poisoned.into_inner()
        }
    };
    f(&guard)
}

fn state_of(item: &StatusNotifierItem) -> SniState {
    SniState::from(item)
}

async fn run_host(mut output: iced_mpsc::Sender<HostMessage>) {
    let client = match Client::new().await {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!(error = ?e, "failed to create system-tray client");
            future::pending::<()>().await;
            return;
        }
    };
    info!("sni host started");

    let (activate_tx, mut activate_rx) = mpsc::channel::<ActivateRequest>(32);
    let _ = output
        .send(HostMessage::ActivateChannelReady(activate_tx))
        .await;

    let mut rx = client.subscribe();

    let initial = snapshot(&client, |items| {
        items
            .iter()
            .map(|(address, (item, menu))| {
                (
                    address.clone(),
                    SniState::from(item),
                    menu.as_ref().map(menu::convert_menu),
                )
            })
            .collect::<Vec<_>>()
    });

    for (address, state, items) in initial {
        let _ = output
            .send(HostMessage::ItemAdded {
                address: address.clone(),
                state,
            })
            .await;
        if let Some(items) = items {
            let _ = output
                .send(HostMessage::MenuUpdated { address, items })
                .await;
        }
    }

    let client_for_activate = Arc::clone(&client);
    tokio::spawn(async move {
        while let Some(request) = activate_rx.recv().await {
            if let Err(e) = client_for_activate.activate(request).await {
                warn!(error = ?e, "activation failed");
            }
        }
    });

    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(e) => {
                error!(error = ?e, "system tray event stream closed");
                break;
            }
        };

        let message = match event {
            Event::Add(address, item) => {
                debug!(%address, "sni item added");
                HostMessage::ItemAdded {
                    address,
                    state: state_of(&item),
                }
            }
            Event::Update(address, UpdateEvent::Menu(menu)) => HostMessage::MenuUpdated {
                address,
                items: menu::convert_menu(&menu),
            },
            Event::Update(address, _) => {
                // Re-read the whole item: the client has already applied the
                // change to its table.
                debug!(%address, "sni item updated");
                let state = snapshot(&client, |items| {
                    items.get(&address).map(|(item, _)| state_of(item))
                });
                match state {
                    Some(state) => HostMessage::ItemUpdated { address, state },
                    None => continue,
                }
            }
            Event::Remove(address) => {
                debug!(%address, "sni item removed");
                HostMessage::ItemRemoved(address)
            }
        };

        if output.send(message).await.is_err() {
            break;
        }
    }

    future::pending::<()>().await;
}
