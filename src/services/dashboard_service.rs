// src/services/dashboard_service.rs

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{dashboard_repo::DashboardRaw, DashboardRepository, UserRepository},
    models::{
        auth::User,
        dashboard::{Dashboard, StatusCountRow, StatusSummary, UserPerformance},
        lead::{STATUS_ASSIGNED, STATUS_CLOSED, STATUS_DEAL_DROP, STATUS_IN_PROGRESS, STATUS_NEW},
    },
};

impl StatusSummary {
    fn add(&mut self, status: &str, count: i64) {
        self.total_leads += count;
        match status {
            STATUS_NEW => self.new_leads += count,
            STATUS_IN_PROGRESS => self.in_progress_leads += count,
            STATUS_ASSIGNED => self.assigned_leads += count,
            STATUS_DEAL_DROP => self.deal_drop_leads += count,
            STATUS_CLOSED => self.closed_leads += count,
            _ => self.other_leads += count,
        }
    }
}

/// % de leads fechados, arredondado.
pub fn conversion_rate(summary: &StatusSummary) -> i64 {
    if summary.total_leads == 0 {
        return 0;
    }
    (summary.closed_leads * 100 + summary.total_leads / 2) / summary.total_leads
}

pub fn summarize(rows: &[StatusCountRow], assignee: Option<Uuid>) -> StatusSummary {
    let mut summary = StatusSummary::default();
    for row in rows.iter().filter(|r| assignee.is_none() || r.assigned_to == assignee) {
        summary.add(&row.status, row.count);
    }
    summary
}

/// Monta o dashboard a partir das agregações do banco.
pub fn build_dashboard(raw: DashboardRaw, users: &[User]) -> Dashboard {
    let summary = summarize(&raw.status_counts, None);
    let by_source: BTreeMap<String, i64> = raw.source_counts.into_iter().collect();

    let mut performance: Vec<UserPerformance> = users
        .iter()
        .map(|user| {
            let summary = summarize(&raw.status_counts, Some(user.id));
            UserPerformance {
                user_id: user.id,
                full_name: user.full_name.clone(),
                conversion_rate: conversion_rate(&summary),
                summary,
            }
        })
        .collect();
    performance.sort_by(|a, b| {
        b.summary
            .closed_leads
            .cmp(&a.summary.closed_leads)
            .then_with(|| a.full_name.cmp(&b.full_name))
    });

    Dashboard {
        summary,
        by_source,
        users: performance,
        chairs_by_model: raw.chairs_by_model,
        chairs_by_user: raw.chairs_by_user,
    }
}

#[derive(Clone)]
pub struct DashboardService {
    repo: DashboardRepository,
    user_repo: UserRepository,
}

impl DashboardService {
    pub fn new(repo: DashboardRepository, user_repo: UserRepository) -> Self {
        Self { repo, user_repo }
    }

    /// Admin vê tudo; agente vê só os próprios leads.
    pub async fn get_dashboard(&self, viewer: &User) -> Result<Dashboard, AppError> {
        let (scope, users) = if viewer.is_admin() {
            (None, self.user_repo.list().await?)
        } else {
            (Some(viewer.id), vec![viewer.clone()])
        };

        let raw = self.repo.load(self.repo.pool(), scope).await?;
        Ok(build_dashboard(raw, &users))
    }
}
