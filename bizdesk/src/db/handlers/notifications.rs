//! Database repository for in-app notifications. Every query is scoped to one recipient.

use crate::db::{
    errors::Result,
    models::notifications::{NotificationCreateDBRequest, NotificationDBResponse},
};
use crate::types::{NotificationId, TenantId, UserId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

pub struct Notifications<'c> {
    db: &'c mut PgConnection,
    tenant_id: TenantId,
}

fn push_recipient_filters(query: &mut QueryBuilder<'_, Postgres>, user_id: UserId, unread_only: bool) {
    query.push(" AND user_id = ");
    query.push_bind(user_id);
    if unread_only {
        query.push(" AND read_at IS NULL");
    }
}

impl<'c> Notifications<'c> {
    pub fn new(db: &'c mut PgConnection, tenant_id: TenantId) -> Self {
        Self { db, tenant_id }
    }

    #[instrument(skip(self, requests), fields(count = requests.len()), err)]
    pub async fn create_many(&mut self, requests: &[NotificationCreateDBRequest]) -> Result<Vec<NotificationDBResponse>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = QueryBuilder::new("INSERT INTO notifications (tenant_id, user_id, kind, message, candidate_id, note_id) ");
        query.push_values(requests, |mut row, request| {
            row.push_bind(self.tenant_id)
                .push_bind(request.user_id)
                .push_bind(&request.kind)
                .push_bind(&request.message)
                .push_bind(request.candidate_id)
                .push_bind(request.note_id);
        });
        query.push(" RETURNING *");
        let rows = query.build_query_as::<NotificationDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(rows)
    }

    /// Newest first.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn list_for_user(&mut self, user_id: UserId, unread_only: bool, skip: i64, limit: i64) -> Result<Vec<NotificationDBResponse>> {
        let mut query = QueryBuilder::new("SELECT * FROM notifications WHERE tenant_id = ");
        query.push_bind(self.tenant_id);
        push_recipient_filters(&mut query, user_id, unread_only);
        query.push(" ORDER BY created_at DESC, id LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(skip);
        let rows = query.build_query_as::<NotificationDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(rows)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn count_for_user(&mut self, user_id: UserId, unread_only: bool) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM notifications WHERE tenant_id = ");
        query.push_bind(self.tenant_id);
        push_recipient_filters(&mut query, user_id, unread_only);
        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Mark a notification read. Returns `None` if it does not belong to `user_id`.
    /// Already-read notifications keep their original `read_at`.
    #[instrument(skip(self), fields(notification_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_read(&mut self, id: NotificationId, user_id: UserId) -> Result<Option<NotificationDBResponse>> {
        let notification = sqlx::query_as::<_, NotificationDBResponse>(
            r#"
            UPDATE notifications SET read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND tenant_id = $2 AND user_id = $3
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(self.tenant_id)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(notification)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn mark_all_read(&mut self, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("UPDATE notifications SET read_at = NOW() WHERE tenant_id = $1 AND user_id = $2 AND read_at IS NULL")
            .bind(self.tenant_id)
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::notifications::KIND_MENTION;
    use crate::api::models::users::Role;
    use crate::test_utils::{create_test_tenant, create_test_user};
    use sqlx::PgPool;

    fn mention(user_id: UserId, message: &str) -> NotificationCreateDBRequest {
        NotificationCreateDBRequest {
            user_id,
            kind: KIND_MENTION.to_string(),
            message: message.to_string(),
            candidate_id: None,
            note_id: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unread_filter_and_mark_read(pool: PgPool) {
        let tenant = create_test_tenant(&pool, "acme").await;
        let alice = create_test_user(&pool, tenant, Role::Recruiter).await;
        let bob = create_test_user(&pool, tenant, Role::Recruiter).await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Notifications::new(&mut conn, tenant);
        let created = repo
            .create_many(&[mention(alice.id, "one"), mention(alice.id, "two"), mention(bob.id, "three")])
            .await
            .unwrap();
        assert_eq!(created.len(), 3);
        assert!(repo.create_many(&[]).await.unwrap().is_empty());

        assert_eq!(repo.count_for_user(alice.id, false).await.unwrap(), 2);
        assert_eq!(repo.count_for_user(bob.id, false).await.unwrap(), 1);

        let first = created.iter().find(|n| n.user_id == alice.id).unwrap();
        // Bob cannot mark Alice's notification
        assert!(repo.mark_read(first.id, bob.id).await.unwrap().is_none());

        let read = repo.mark_read(first.id, alice.id).await.unwrap().unwrap();
        let read_at = read.read_at.unwrap();
        let again = repo.mark_read(first.id, alice.id).await.unwrap().unwrap();
        assert_eq!(again.read_at, Some(read_at));

        assert_eq!(repo.count_for_user(alice.id, true).await.unwrap(), 1);
        let unread = repo.list_for_user(alice.id, true, 0, 10).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_ne!(unread[0].id, first.id);

        assert_eq!(repo.mark_all_read(alice.id).await.unwrap(), 1);
        assert_eq!(repo.count_for_user(alice.id, true).await.unwrap(), 0);
        assert_eq!(repo.count_for_user(bob.id, true).await.unwrap(), 1);
    }
}
