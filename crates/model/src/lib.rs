pub mod error;

pub mod core {
    pub mod data_type;
    pub mod utils;
    pub mod value;
}

pub mod records {
    pub mod row;
}

pub mod schema {
    pub mod cast;
    pub mod descriptor;
}
