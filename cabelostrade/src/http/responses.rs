use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::policy::{AdminActionType, FeaturedType, ReviewKind, TicketStatus, TransactionStatus};
use crate::store::{ProductImage, ProductWithSeller, SupportStaff};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectUrlResponse {
    pub redirect_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub hair_type: Option<String>,
    pub hair_color: Option<String>,
    pub hair_origin: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductDetailResponse {
    #[serde(flatten)]
    pub product: ProductWithSeller,
    pub images: Vec<ProductImage>,
    pub can_edit: bool,
}

#[derive(Debug, Deserialize)]
pub struct AddImageRequest {
    pub product_id: i64,
    pub image_url: String,
    #[serde(default)]
    pub display_order: i64,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub liked: bool,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub id: String,
    pub filename: String,
    pub size: usize,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ImageUrlResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub product_id: i64,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionStatusRequest {
    pub status: TransactionStatus,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionReviewRequest {
    pub rating: i64,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileReviewRequest {
    pub reviewed_id: String,
    pub rating: i64,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewResponseRequest {
    pub review_id: i64,
    pub review_type: ReviewKind,
    pub response_text: String,
}

#[derive(Debug, Deserialize)]
pub struct OpenConversationRequest {
    pub product_id: i64,
    pub initial_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub message: String,
    pub message_type: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminSetupRequest {
    pub setup_key: String,
}

#[derive(Debug, Serialize)]
pub struct AdminCheckResponse {
    pub role: String,
    pub permissions: Value,
}

#[derive(Debug, Deserialize)]
pub struct AdminActionRequest {
    pub target_user_id: String,
    pub action_type: AdminActionType,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewKindQuery {
    #[serde(rename = "type")]
    pub kind: Option<ReviewKind>,
}

#[derive(Debug, Deserialize)]
pub struct FeatureProductRequest {
    pub product_id: i64,
    pub featured_type: FeaturedType,
    pub duration_days: i64,
    pub price_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct AdminSendMessageRequest {
    pub user_id: String,
    pub message: String,
    pub subject: Option<String>,
    pub message_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminMessageSent<T: Serialize> {
    pub success: bool,
    pub message: T,
}

/// The public face of a staff account.
#[derive(Debug, Serialize)]
pub struct SupportUser {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl From<SupportStaff> for SupportUser {
    fn from(staff: SupportStaff) -> Self {
        Self {
            id: staff.id,
            username: staff.username,
            name: staff.name,
            email: staff.email,
            role: staff.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SupportLoginResponse {
    pub success: bool,
    pub user: SupportUser,
}

#[derive(Debug, Deserialize)]
pub struct TicketResponseRequest {
    pub message: String,
    #[serde(default)]
    pub is_internal: bool,
}

#[derive(Debug, Deserialize)]
pub struct TicketStatusRequest {
    pub status: TicketStatus,
}
