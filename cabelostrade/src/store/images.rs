use chrono::{DateTime, Utc};
use tracing::debug;

use super::{Store, StoreResult, UploadedImage};

impl Store {
    /// Stores an already-validated upload as a data URL under `id`.
    pub async fn save_uploaded_image(
        &self,
        id: &str,
        user_id: &str,
        filename: &str,
        content_type: &str,
        data_url: &str,
        file_size: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<UploadedImage> {
        let image = sqlx::query_as::<_, UploadedImage>(
            "INSERT INTO uploaded_images (id, user_id, filename, content_type, data_url, file_size, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .bind(filename)
        .bind(content_type)
        .bind(data_url)
        .bind(file_size)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        debug!(image_id = id, user_id, file_size, "image stored");
        Ok(image)
    }

    pub async fn uploaded_image(&self, id: &str) -> StoreResult<Option<UploadedImage>> {
        let image = sqlx::query_as::<_, UploadedImage>("SELECT * FROM uploaded_images WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(image)
    }
}
