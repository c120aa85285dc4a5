// src/services/live_hub.rs

// Fan-out das mensagens novas para quem está com a conversa aberta.
// Um canal broadcast por lead; entrega é best-effort.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::models::chat::ChatMessage;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Clone, Default)]
pub struct LiveHub {
    channels: Arc<Mutex<HashMap<Uuid, broadcast::Sender<ChatMessage>>>>,
}

impl LiveHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, lead_id: Uuid) -> broadcast::Receiver<ChatMessage> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(lead_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publica para os inscritos do lead. Retorna quantos receberam.
    pub fn publish(&self, message: &ChatMessage) -> usize {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(sender) = channels.get(&message.lead_id) else {
            return 0;
        };

        match sender.send(message.clone()) {
            Ok(delivered) => delivered,
            Err(_) => {
                // Ninguém mais escutando: libera o canal
                channels.remove(&message.lead_id);
                debug!("Canal ao vivo do lead {} encerrado", message.lead_id);
                0
            }
        }
    }

    /// Remove o canal do lead quando o último espectador saiu.
    pub fn release(&self, lead_id: Uuid) {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        if channels
            .get(&lead_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&lead_id);
            debug!("Canal ao vivo do lead {} liberado", lead_id);
        }
    }
}
