use super::{HabitPatch, HabitRow, LogRow, RemoteStore};
use crate::auth::Session;
use crate::backend::BackendError;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;

/// `RemoteStore` over a PostgREST endpoint (`{base}/rest/v1/{table}`).
#[derive(Debug, Clone)]
pub struct RestStore {
    base_url: String,
    api_key: String,
    client: Client,
}

#[derive(Deserialize)]
struct IdRow {
    id: String,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    fn request(&self, method: Method, table: &str, session: &Session) -> RequestBuilder {
        self.client
            .request(method, format!("{}/rest/v1/{table}", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
    }

    async fn check(response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(BackendError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

/// PostgREST `in.(...)` filter with quoted members.
fn in_filter(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|value| format!("\"{}\"", value.replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn select_habits(&self, session: &Session) -> Result<Vec<HabitRow>, BackendError> {
        let response = self
            .request(Method::GET, "habits", session)
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", session.principal.id)),
                ("active", "eq.true".to_string()),
                ("order", "created_at.asc".to_string()),
            ])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn select_habit_ids(&self, session: &Session) -> Result<Vec<String>, BackendError> {
        let response = self
            .request(Method::GET, "habits", session)
            .query(&[
                ("select", "id".to_string()),
                ("user_id", format!("eq.{}", session.principal.id)),
            ])
            .send()
            .await?;
        let rows: Vec<IdRow> = Self::check(response).await?.json().await?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    async fn select_completed_logs(
        &self,
        session: &Session,
        habit_ids: &[String],
    ) -> Result<Vec<LogRow>, BackendError> {
        let response = self
            .request(Method::GET, "habit_logs", session)
            .query(&[
                ("select", "habit_id,date,completed".to_string()),
                ("habit_id", in_filter(habit_ids)),
                ("completed", "eq.true".to_string()),
            ])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn insert_habit(&self, session: &Session, row: &HabitRow) -> Result<(), BackendError> {
        let response = self
            .request(Method::POST, "habits", session)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn update_habit(
        &self,
        session: &Session,
        habit_id: &str,
        patch: &HabitPatch,
    ) -> Result<(), BackendError> {
        let response = self
            .request(Method::PATCH, "habits", session)
            .query(&[("id", format!("eq.{habit_id}"))])
            .header("Prefer", "return=minimal")
            .json(patch)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete_habit(&self, session: &Session, habit_id: &str) -> Result<(), BackendError> {
        let response = self
            .request(Method::DELETE, "habits", session)
            .query(&[("id", format!("eq.{habit_id}"))])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn upsert_log(&self, session: &Session, row: &LogRow) -> Result<(), BackendError> {
        let response = self
            .request(Method::POST, "habit_logs", session)
            .query(&[("on_conflict", "habit_id,date")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete_log(
        &self,
        session: &Session,
        habit_id: &str,
        date: NaiveDate,
    ) -> Result<(), BackendError> {
        let response = self
            .request(Method::DELETE, "habit_logs", session)
            .query(&[
                ("habit_id", format!("eq.{habit_id}")),
                ("date", format!("eq.{date}")),
            ])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
