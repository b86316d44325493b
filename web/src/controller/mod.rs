pub(crate) mod health_check_controller;
pub(crate) mod order_controller;
pub(crate) mod product_controller;
pub(crate) mod sale_controller;
