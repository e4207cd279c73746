pub const SHORT_CODE_LENGTH: usize = 8;

pub const SHOPPING_LIST_FILE_NAME: &str = "shopping_cart.txt";
pub const SHOPPING_LIST_HEADER: &str = "Список покупок:";
pub const SHOPPING_LIST_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

pub const IMAGES_DIR: &str = "recipes/images";
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "gif", "webp"];

// Column widths of sql/schema.sql
pub const RECIPE_NAME_MAX_LENGTH: usize = 256;
pub const INGREDIENT_NAME_MAX_LENGTH: usize = 128;
pub const MEASUREMENT_UNIT_MAX_LENGTH: usize = 64;

pub const SESSION_COOKIE: &str = "session";
