//! User accounts, API tokens and notification preferences.

use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info};

use super::{constraint_error, now_rfc3339, Database, DbError, DbResult};
use crate::auth::{generate_token_key, hash_password, verify_password};
use crate::models::{
    NewUser, NotificationPreference, NotificationPreferenceFields, NotificationPreferenceInput,
    User, UserSummary,
};
use crate::validation::ValidationErrors;

const SELECT_USER: &str = r#"
    SELECT id, username, password_hash, first_name, last_name, email, is_active, date_joined
    FROM users
"#;

const SELECT_PREFERENCE: &str = r#"
    SELECT n.id, n.email_notifications, n.sms_alerts, n.test_results_ready, n.system_updates,
           u.id, u.username, u.first_name, u.last_name, u.email, u.is_active
    FROM notification_preferences n
    JOIN users u ON u.id = n.user_id
"#;

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        email: row.get(5)?,
        is_active: row.get(6)?,
        date_joined: row.get(7)?,
    })
}

fn preference_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationPreference> {
    Ok(NotificationPreference {
        id: row.get(0)?,
        email_notifications: row.get(1)?,
        sms_alerts: row.get(2)?,
        test_results_ready: row.get(3)?,
        system_updates: row.get(4)?,
        user: UserSummary {
            id: row.get(5)?,
            username: row.get(6)?,
            first_name: row.get(7)?,
            last_name: row.get(8)?,
            email: row.get(9)?,
            is_active: row.get(10)?,
        },
    })
}

impl Database {
    // ========================================================================
    // Users
    // ========================================================================

    /// Provision a login account. The password is stored as an argon2 hash.
    pub fn create_user(&self, new_user: &NewUser) -> DbResult<User> {
        new_user.validate()?;
        let mut errors = ValidationErrors::new();
        self.check_unique(&mut errors, "users", "user", "username", &new_user.username, None)?;
        errors.into_result()?;

        let password_hash = hash_password(&new_user.password)?;
        self.conn
            .execute(
                r#"
                INSERT INTO users (username, password_hash, first_name, last_name, email, date_joined)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    new_user.username,
                    password_hash,
                    new_user.first_name,
                    new_user.last_name,
                    new_user.email,
                    now_rfc3339(),
                ],
            )
            .map_err(constraint_error)?;
        let id = self.conn.last_insert_rowid();

        info!(id, username = %new_user.username, "created user");
        self.get_user(id)?
            .ok_or_else(|| DbError::NotFound(format!("user {}", id)))
    }

    pub fn get_user(&self, id: i64) -> DbResult<Option<User>> {
        let sql = format!("{} WHERE id = ?", SELECT_USER);
        self.conn
            .query_row(&sql, [id], user_from_row)
            .optional()
            .map_err(Into::into)
    }

    pub fn get_user_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let sql = format!("{} WHERE username = ?", SELECT_USER);
        self.conn
            .query_row(&sql, [username], user_from_row)
            .optional()
            .map_err(Into::into)
    }

    /// Enable or disable a login account.
    pub fn set_user_active(&self, id: i64, is_active: bool) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE users SET is_active = ?2 WHERE id = ?1",
            params![id, is_active],
        )?;
        Ok(rows_affected > 0)
    }

    // ========================================================================
    // Tokens
    // ========================================================================

    /// Exchange credentials for the user's API token key.
    ///
    /// The token is created on first successful login and returned unchanged
    /// afterwards. Unknown users, wrong passwords and inactive accounts all
    /// yield `None`.
    pub fn authenticate(&self, username: &str, password: &str) -> DbResult<Option<String>> {
        let Some(user) = self.get_user_by_username(username)? else {
            debug!("login for unknown user");
            return Ok(None);
        };
        // Always hash, inactive or not
        if !verify_password(password, &user.password_hash)? || !user.is_active {
            debug!(user_id = user.id, "login rejected");
            return Ok(None);
        }
        self.token_for_user(user.id).map(Some)
    }

    /// Get the user's token key, creating it if it doesn't exist yet.
    fn token_for_user(&self, user_id: i64) -> DbResult<String> {
        let tx = self.write_transaction()?;
        let existing: Option<String> = tx
            .query_row(
                "SELECT key FROM auth_tokens WHERE user_id = ?",
                [user_id],
                |row| row.get(0),
            )
            .optional()?;
        let key = match existing {
            Some(key) => key,
            None => {
                let key = generate_token_key();
                tx.execute(
                    "INSERT INTO auth_tokens (key, user_id, created) VALUES (?1, ?2, ?3)",
                    params![key, user_id, now_rfc3339()],
                )
                .map_err(constraint_error)?;
                info!(user_id, "issued API token");
                key
            }
        };
        tx.commit()?;
        Ok(key)
    }

    /// Resolve a token key to its active user.
    pub fn user_for_token(&self, key: &str) -> DbResult<Option<User>> {
        let sql = format!(
            "{} WHERE id = (SELECT user_id FROM auth_tokens WHERE key = ?) AND is_active = 1",
            SELECT_USER
        );
        self.conn
            .query_row(&sql, [key], user_from_row)
            .optional()
            .map_err(Into::into)
    }

    // ========================================================================
    // Notification preferences
    // ========================================================================

    fn checked_preference(
        &self,
        input: &NotificationPreferenceInput,
        exclude_id: Option<i64>,
    ) -> DbResult<NotificationPreferenceFields> {
        let fields = input.validate()?;
        let mut errors = ValidationErrors::new();
        self.check_reference(&mut errors, "user_id", "users", fields.user_id)?;
        self.check_unique(
            &mut errors,
            "notification_preferences",
            "notification preference",
            "user_id",
            fields.user_id,
            exclude_id,
        )?;
        errors.into_result()?;
        Ok(fields)
    }

    pub fn create_notification_preference(
        &self,
        input: &NotificationPreferenceInput,
    ) -> DbResult<NotificationPreference> {
        let f = self.checked_preference(input, None)?;
        self.conn
            .execute(
                r#"
                INSERT INTO notification_preferences (
                    user_id, email_notifications, sms_alerts, test_results_ready, system_updates
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    f.user_id,
                    f.email_notifications,
                    f.sms_alerts,
                    f.test_results_ready,
                    f.system_updates
                ],
            )
            .map_err(constraint_error)?;
        let id = self.conn.last_insert_rowid();
        self.get_notification_preference(id)?
            .ok_or_else(|| DbError::NotFound(format!("notification preference {}", id)))
    }

    pub fn update_notification_preference(
        &self,
        id: i64,
        input: &NotificationPreferenceInput,
    ) -> DbResult<Option<NotificationPreference>> {
        let f = self.checked_preference(input, Some(id))?;
        let rows_affected = self
            .conn
            .execute(
                r#"
                UPDATE notification_preferences SET
                    user_id = ?2, email_notifications = ?3, sms_alerts = ?4,
                    test_results_ready = ?5, system_updates = ?6
                WHERE id = ?1
                "#,
                params![
                    id,
                    f.user_id,
                    f.email_notifications,
                    f.sms_alerts,
                    f.test_results_ready,
                    f.system_updates
                ],
            )
            .map_err(constraint_error)?;
        if rows_affected == 0 {
            return Ok(None);
        }
        self.get_notification_preference(id)
    }

    pub fn get_notification_preference(&self, id: i64) -> DbResult<Option<NotificationPreference>> {
        let sql = format!("{} WHERE n.id = ?", SELECT_PREFERENCE);
        self.conn
            .query_row(&sql, [id], preference_from_row)
            .optional()
            .map_err(Into::into)
    }

    pub fn list_notification_preferences(&self) -> DbResult<Vec<NotificationPreference>> {
        let sql = format!("{} ORDER BY n.id", SELECT_PREFERENCE);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], preference_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn delete_notification_preference(&self, id: i64) -> DbResult<bool> {
        self.delete_row("notification_preferences", id)
    }
}
