//! Row types returned by the store and serialized straight into responses.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::policy::{
    AdminActionType, FeaturedType, ReviewKind, TicketCategory, TicketPriority, TicketStatus,
    TransactionStatus,
};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Profile {
    pub id: i64,
    pub user_id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
    pub whatsapp_number: Option<String>,
    pub business_name: Option<String>,
    pub business_type: Option<String>,
    pub is_seller: bool,
    pub is_buyer: bool,
    pub rating_avg: f64,
    pub rating_count: i64,
    pub total_sales: i64,
    pub total_purchases: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProfileWithStatus {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub profile: Profile,
    pub is_blocked: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: i64,
    pub seller_id: String,
    pub title: String,
    pub description: Option<String>,
    pub hair_type: Option<String>,
    pub hair_color: Option<String>,
    pub hair_length: Option<i64>,
    pub weight_grams: Option<i64>,
    pub hair_origin: Option<String>,
    pub hair_texture: Option<String>,
    pub price_cents: i64,
    pub is_available: bool,
    pub main_image_url: Option<String>,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product as shown in the public listing.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub product: Product,
    pub seller_name: Option<String>,
    pub seller_rating: Option<f64>,
    pub featured_type: Option<FeaturedType>,
    pub featured_expires_at: Option<DateTime<Utc>>,
    pub featured_priority: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductWithSeller {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub product: Product,
    pub seller_name: Option<String>,
    pub seller_rating: Option<f64>,
    pub rating_count: Option<i64>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductImage {
    pub id: i64,
    pub product_id: i64,
    pub image_url: String,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UploadedImage {
    pub id: String,
    pub user_id: String,
    pub filename: String,
    pub content_type: String,
    pub data_url: String,
    pub file_size: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Transaction {
    pub id: i64,
    pub buyer_id: String,
    pub seller_id: String,
    pub product_id: i64,
    pub amount_cents: i64,
    pub status: TransactionStatus,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub escrow_released: bool,
    pub delivery_confirmed_at: Option<DateTime<Utc>>,
    pub admin_released_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TransactionView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub transaction: Transaction,
    pub product_title: Option<String>,
    pub main_image_url: Option<String>,
    pub buyer_name: Option<String>,
    pub seller_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TransactionUpdate {
    pub id: i64,
    pub transaction_id: i64,
    pub status: TransactionStatus,
    pub comment: Option<String>,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Review {
    pub id: i64,
    pub transaction_id: i64,
    pub reviewer_id: String,
    pub reviewed_id: String,
    pub rating: i64,
    pub comment: Option<String>,
    pub review_type: String,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProfileReview {
    pub id: i64,
    pub reviewer_id: String,
    pub reviewed_id: String,
    pub rating: i64,
    pub comment: Option<String>,
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReviewResponse {
    pub id: i64,
    pub review_id: i64,
    pub review_type: ReviewKind,
    pub responder_id: String,
    pub response_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReviewResponseView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub response: ReviewResponse,
    pub responder_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReceivedReview {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: Review,
    pub reviewer_name: Option<String>,
    pub product_title: Option<String>,
    pub reviewer_transaction_count: i64,
    #[sqlx(skip)]
    pub responses: Vec<ReviewResponseView>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReceivedProfileReview {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: ProfileReview,
    pub reviewer_name: Option<String>,
    pub reviewer_transaction_count: i64,
    #[sqlx(skip)]
    pub responses: Vec<ReviewResponseView>,
}

/// Either kind of review, flattened for the moderation list.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ModerationReview {
    pub id: i64,
    pub transaction_id: Option<i64>,
    pub reviewer_id: String,
    pub reviewed_id: String,
    pub rating: i64,
    pub comment: Option<String>,
    pub reviewer_name: Option<String>,
    pub reviewed_name: Option<String>,
    pub review_type_name: ReviewKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    #[serde(flatten)]
    pub profile: Profile,
    pub products: Vec<Product>,
    pub reviews_received: Vec<ReceivedReview>,
    pub profile_reviews: Vec<ReceivedProfileReview>,
    pub is_blocked: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Conversation {
    pub id: i64,
    pub buyer_id: String,
    pub seller_id: String,
    pub product_id: i64,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ConversationSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub conversation: Conversation,
    pub product_title: Option<String>,
    pub product_image_url: Option<String>,
    pub other_user_name: Option<String>,
    pub last_message: Option<String>,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ConversationOverview {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub conversation: Conversation,
    pub product_title: Option<String>,
    pub buyer_name: Option<String>,
    pub seller_name: Option<String>,
    pub message_count: i64,
    pub last_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChatMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: String,
    pub message: String,
    pub message_type: String,
    pub image_url: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChatMessageView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub message: ChatMessage,
    pub sender_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AdminUser {
    pub id: i64,
    pub user_id: String,
    pub role: String,
    pub permissions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AdminAction {
    pub id: i64,
    pub admin_id: String,
    pub target_user_id: String,
    pub action_type: AdminActionType,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FeaturedProduct {
    pub id: i64,
    pub product_id: i64,
    pub seller_id: String,
    pub featured_type: FeaturedType,
    pub price_paid_cents: i64,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AdminMessage {
    pub id: i64,
    pub admin_id: String,
    pub user_id: String,
    pub subject: Option<String>,
    pub message: String,
    pub message_type: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AdminMessageView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub message: AdminMessage,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct MarketStats {
    pub total_users: i64,
    pub total_sellers: i64,
    pub total_buyers: i64,
    pub total_products: i64,
    pub total_transactions: i64,
    pub total_revenue_cents: i64,
    pub featured_revenue_cents: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SupportStaff {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SupportTicket {
    pub id: i64,
    pub user_id: Option<String>,
    pub user_name: String,
    pub user_email: String,
    pub subject: String,
    pub message: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub category: TicketCategory,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SupportResponse {
    pub id: i64,
    pub ticket_id: i64,
    pub responder_id: String,
    pub responder_name: String,
    pub message: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
