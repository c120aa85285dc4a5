// src/services/chair_service.rs

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::info;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::ChairRepository,
    models::chair::{AddColorPayload, Chair, ChairColor, ChairWithColors, UpdateChairPayload, UpdateColorPayload},
    services::lead_service::gst_multiplier,
};

/// Preço final exibido no catálogo (2 casas).
pub fn final_price(base_price: Decimal, gst_applicable: bool) -> Decimal {
    let price = if gst_applicable { base_price * gst_multiplier() } else { base_price };
    price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn ensure_valid_price(base_price: Decimal) -> Result<(), AppError> {
    if base_price < Decimal::ZERO {
        return Err(AppError::BadRequest("O preço não pode ser negativo.".into()));
    }
    Ok(())
}

/// Agrupa as cores ativas sob o respectivo modelo, preservando a ordem dos modelos.
pub fn group_catalog(chairs: Vec<Chair>, colors: Vec<ChairColor>) -> Vec<ChairWithColors> {
    chairs
        .into_iter()
        .map(|chair| {
            let colors = colors.iter().filter(|c| c.chair_id == chair.id).cloned().collect();
            ChairWithColors { chair, colors }
        })
        .collect()
}

#[derive(Clone)]
pub struct ChairService {
    repo: ChairRepository,
}

impl ChairService {
    pub fn new(repo: ChairRepository) -> Self {
        Self { repo }
    }

    pub async fn create_chair(&self, model_name: &str) -> Result<Chair, AppError> {
        let chair = self.repo.create_chair(model_name.trim()).await?;
        info!("🪑 Modelo '{}' cadastrado", chair.model_name);
        Ok(chair)
    }

    pub async fn catalog(&self) -> Result<Vec<ChairWithColors>, AppError> {
        let chairs = self.repo.list_active_chairs().await?;
        let colors = self.repo.list_active_colors().await?;
        Ok(group_catalog(chairs, colors))
    }

    pub async fn add_color(&self, chair_id: Uuid, payload: &AddColorPayload) -> Result<ChairColor, AppError> {
        ensure_valid_price(payload.base_price)?;

        self.repo
            .find_chair(chair_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Cadeira".into()))?;

        self.repo
            .add_color(
                chair_id,
                payload.name.trim(),
                payload.base_price,
                payload.gst_applicable,
                final_price(payload.base_price, payload.gst_applicable),
            )
            .await
    }

    pub async fn update_chair(&self, id: Uuid, payload: &UpdateChairPayload) -> Result<Chair, AppError> {
        let chair = self
            .repo
            .update_chair(id, payload.model_name.trim(), payload.is_active)
            .await?
            .ok_or_else(|| AppError::NotFound("Cadeira".into()))?;

        info!("🪑 Modelo '{}' atualizado (ativo: {})", chair.model_name, chair.is_active);
        Ok(chair)
    }

    pub async fn delete_chair(&self, id: Uuid) -> Result<(), AppError> {
        if !self.repo.delete_chair(id).await? {
            return Err(AppError::NotFound("Cadeira".into()));
        }
        info!("🗑️ Modelo {} excluído", id);
        Ok(())
    }

    /// O preço final é recalculado a partir do novo preço base.
    pub async fn update_color(
        &self,
        chair_id: Uuid,
        color_id: Uuid,
        payload: &UpdateColorPayload,
    ) -> Result<ChairColor, AppError> {
        ensure_valid_price(payload.base_price)?;

        self.repo
            .update_color(
                chair_id,
                color_id,
                payload.name.trim(),
                payload.base_price,
                payload.gst_applicable,
                final_price(payload.base_price, payload.gst_applicable),
                payload.is_active,
            )
            .await?
            .ok_or_else(|| AppError::NotFound("Cor".into()))
    }

    pub async fn delete_color(&self, chair_id: Uuid, color_id: Uuid) -> Result<(), AppError> {
        if !self.repo.delete_color(chair_id, color_id).await? {
            return Err(AppError::NotFound("Cor".into()));
        }
        info!("🗑️ Cor {} removida do modelo {}", color_id, chair_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn chair(name: &str) -> Chair {
        Chair { id: Uuid::new_v4(), model_name: name.into(), is_active: true, created_at: Utc::now() }
    }

    fn color(chair_id: Uuid, name: &str) -> ChairColor {
        ChairColor {
            id: Uuid::new_v4(),
            chair_id,
            name: name.into(),
            base_price: Decimal::new(1000, 0),
            gst_applicable: false,
            final_price: Decimal::new(1000, 0),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn gst_is_added_only_when_applicable() {
        assert_eq!(final_price(Decimal::new(4500, 0), true), Decimal::new(5310, 0));
        assert_eq!(final_price(Decimal::new(4500, 0), false), Decimal::new(4500, 0));
        // 99.99 * 1.18 = 117.9882
        assert_eq!(final_price(Decimal::new(9999, 2), true), Decimal::new(11799, 2));
    }

    #[test]
    fn colors_are_grouped_under_their_model() {
        let ergo = chair("Ergo");
        let mesh = chair("Mesh");
        let colors = vec![color(ergo.id, "Preto"), color(mesh.id, "Cinza"), color(ergo.id, "Azul")];

        let catalog = group_catalog(vec![ergo.clone(), mesh.clone()], colors);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].colors.len(), 2);
        assert_eq!(catalog[1].colors[0].name, "Cinza");
    }

    #[test]
    fn negative_prices_are_rejected() {
        assert!(ensure_valid_price(Decimal::new(4500, 0)).is_ok());
        assert!(ensure_valid_price(Decimal::ZERO).is_ok());
        assert!(matches!(ensure_valid_price(Decimal::new(-1, 2)), Err(AppError::BadRequest(_))));
    }
}
