// Kept in sync by hand with the DDL in `repository::context`.

diesel::table! {
    sources (id) {
        id -> Integer,
        name -> Text,
        base_url -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    categories (id) {
        id -> Integer,
        path -> Text,
        name -> Text,
    }
}

diesel::table! {
    products (id) {
        id -> Integer,
        name -> Text,
        brand -> Text,
        description -> Nullable<Text>,
        image_url -> Nullable<Text>,
        category -> Nullable<Text>,
        sku -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    price_snapshots (id) {
        id -> Integer,
        product_id -> Integer,
        source_id -> Integer,
        price -> Double,
        stock -> Nullable<Integer>,
        rating -> Nullable<Double>,
        url -> Text,
        observed_at -> Text,
        observed_on -> Text,
    }
}

diesel::table! {
    run_log (id) {
        id -> Integer,
        source_id -> Integer,
        category_id -> Nullable<Integer>,
        category -> Text,
        found -> Integer,
        created -> Integer,
        duplicates -> Integer,
        errors -> Integer,
        duration_seconds -> Double,
        outcome -> Text,
        logged_at -> Text,
    }
}

diesel::joinable!(price_snapshots -> products (product_id));
diesel::joinable!(price_snapshots -> sources (source_id));
diesel::joinable!(run_log -> sources (source_id));
diesel::joinable!(run_log -> categories (category_id));

diesel::allow_tables_to_appear_in_same_query!(
    sources,
    categories,
    products,
    price_snapshots,
    run_log,
);
