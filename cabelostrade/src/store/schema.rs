//! Idempotent schema. Relationships are enforced by the store's delete order,
//! not by foreign keys.

pub const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS user_profiles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL UNIQUE,
        name TEXT,
        phone TEXT,
        location TEXT,
        bio TEXT,
        profile_image_url TEXT,
        whatsapp_number TEXT,
        business_name TEXT,
        business_type TEXT,
        is_seller BOOLEAN NOT NULL DEFAULT 0,
        is_buyer BOOLEAN NOT NULL DEFAULT 1,
        rating_avg REAL NOT NULL DEFAULT 0.0,
        rating_count INTEGER NOT NULL DEFAULT 0,
        total_sales INTEGER NOT NULL DEFAULT 0,
        total_purchases INTEGER NOT NULL DEFAULT 0,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        seller_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT,
        hair_type TEXT,
        hair_color TEXT,
        hair_length INTEGER,
        weight_grams INTEGER,
        hair_origin TEXT,
        hair_texture TEXT,
        price_cents INTEGER NOT NULL,
        is_available BOOLEAN NOT NULL DEFAULT 1,
        main_image_url TEXT,
        like_count INTEGER NOT NULL DEFAULT 0,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_products_seller ON products (seller_id)",
    "CREATE TABLE IF NOT EXISTS product_images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id INTEGER NOT NULL,
        image_url TEXT NOT NULL,
        display_order INTEGER NOT NULL DEFAULT 0,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS product_likes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id INTEGER NOT NULL,
        user_id TEXT NOT NULL,
        created_at DATETIME NOT NULL,
        UNIQUE (product_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS uploaded_images (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        filename TEXT NOT NULL,
        content_type TEXT NOT NULL,
        data_url TEXT NOT NULL,
        file_size INTEGER NOT NULL,
        created_at DATETIME NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS transactions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        buyer_id TEXT NOT NULL,
        seller_id TEXT NOT NULL,
        product_id INTEGER NOT NULL,
        amount_cents INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        payment_method TEXT,
        notes TEXT,
        escrow_released BOOLEAN NOT NULL DEFAULT 0,
        delivery_confirmed_at DATETIME,
        admin_released_at DATETIME,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS transaction_updates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        transaction_id INTEGER NOT NULL,
        status TEXT NOT NULL,
        comment TEXT,
        updated_by TEXT NOT NULL,
        created_at DATETIME NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS reviews (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        transaction_id INTEGER NOT NULL,
        reviewer_id TEXT NOT NULL,
        reviewed_id TEXT NOT NULL,
        rating INTEGER NOT NULL CHECK (rating >= 1 AND rating <= 5),
        comment TEXT,
        review_type TEXT NOT NULL,
        is_featured BOOLEAN NOT NULL DEFAULT 0,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL,
        UNIQUE (transaction_id, reviewer_id)
    )",
    "CREATE TABLE IF NOT EXISTS profile_reviews (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        reviewer_id TEXT NOT NULL,
        reviewed_id TEXT NOT NULL,
        rating INTEGER NOT NULL CHECK (rating >= 1 AND rating <= 5),
        comment TEXT,
        is_visible BOOLEAN NOT NULL DEFAULT 1,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_profile_reviews_pair ON profile_reviews (reviewer_id, reviewed_id)",
    "CREATE TABLE IF NOT EXISTS review_responses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        review_id INTEGER NOT NULL,
        review_type TEXT NOT NULL CHECK (review_type IN ('transaction', 'profile')),
        responder_id TEXT NOT NULL,
        response_text TEXT NOT NULL,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS chat_conversations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        buyer_id TEXT NOT NULL,
        seller_id TEXT NOT NULL,
        product_id INTEGER NOT NULL,
        last_message_at DATETIME NOT NULL,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL,
        UNIQUE (buyer_id, seller_id, product_id)
    )",
    "CREATE TABLE IF NOT EXISTS chat_messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        conversation_id INTEGER NOT NULL,
        sender_id TEXT NOT NULL,
        message TEXT NOT NULL,
        message_type TEXT NOT NULL DEFAULT 'text',
        image_url TEXT,
        is_read BOOLEAN NOT NULL DEFAULT 0,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_chat_messages_conversation ON chat_messages (conversation_id)",
    "CREATE TABLE IF NOT EXISTS admin_users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL UNIQUE,
        role TEXT NOT NULL DEFAULT 'admin',
        permissions TEXT,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS admin_setup (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        setup_key TEXT NOT NULL UNIQUE,
        is_used BOOLEAN NOT NULL DEFAULT 0,
        used_by TEXT,
        created_at DATETIME NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS admin_actions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        admin_id TEXT NOT NULL,
        target_user_id TEXT NOT NULL,
        action_type TEXT NOT NULL CHECK (action_type IN ('block', 'unblock', 'warn', 'review', 'note')),
        reason TEXT,
        notes TEXT,
        created_at DATETIME NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS blocked_users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL UNIQUE,
        blocked_by TEXT NOT NULL,
        reason TEXT,
        blocked_at DATETIME NOT NULL,
        expires_at DATETIME
    )",
    "CREATE TABLE IF NOT EXISTS featured_products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id INTEGER NOT NULL,
        seller_id TEXT NOT NULL,
        featured_type TEXT NOT NULL,
        price_paid_cents INTEGER NOT NULL,
        expires_at DATETIME NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS admin_conversations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        admin_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        conversation_type TEXT NOT NULL DEFAULT 'admin_chat',
        last_message_at DATETIME NOT NULL,
        created_at DATETIME NOT NULL,
        UNIQUE (admin_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS admin_messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        admin_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        subject TEXT,
        message TEXT NOT NULL,
        message_type TEXT NOT NULL DEFAULT 'notification',
        is_read BOOLEAN NOT NULL DEFAULT 0,
        created_at DATETIME NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS support_staff (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'support',
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS support_tickets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT,
        user_name TEXT NOT NULL,
        user_email TEXT NOT NULL,
        subject TEXT NOT NULL,
        message TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'open' CHECK (status IN ('open', 'in_progress', 'resolved', 'closed')),
        priority TEXT NOT NULL DEFAULT 'medium' CHECK (priority IN ('low', 'medium', 'high', 'urgent')),
        category TEXT NOT NULL DEFAULT 'general' CHECK (category IN ('technical', 'transaction', 'account', 'product', 'general')),
        assigned_to TEXT,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS support_responses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ticket_id INTEGER NOT NULL,
        responder_id TEXT NOT NULL,
        responder_name TEXT NOT NULL,
        message TEXT NOT NULL,
        is_internal BOOLEAN NOT NULL DEFAULT 0,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    )",
];
