diesel::table! {
    rooms (id) {
        id -> Uuid,
        name -> Varchar,
        capacity -> Int4,
        base_price -> Numeric,
        high_season_price -> Numeric,
        cleaning_fee -> Numeric,
        minimum_stay -> Int4,
    }
}

diesel::table! {
    bookings (id) {
        id -> Uuid,
        room_id -> Uuid,
        check_in -> Date,
        check_out -> Date,
        status -> Varchar,
        guest_name -> Varchar,
        guest_email -> Varchar,
        total_price -> Numeric,
        total_nights -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    availability (id) {
        id -> Uuid,
        room_id -> Uuid,
        date -> Date,
        is_available -> Bool,
        price_override -> Nullable<Numeric>,
        block_type -> Varchar,
        sync_source -> Nullable<Varchar>,
    }
}

diesel::table! {
    calendar_configs (id) {
        id -> Uuid,
        room_id -> Uuid,
        platform -> Varchar,
        feed_url -> Varchar,
        active -> Bool,
        sync_interval_hours -> Int4,
        last_sync_at -> Nullable<Timestamptz>,
        last_sync_status -> Nullable<Varchar>,
        events_last_sync -> Nullable<Int4>,
        dates_last_sync -> Nullable<Int4>,
        last_error_message -> Nullable<Text>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    rooms,
    bookings,
    availability,
    calendar_configs,
);
