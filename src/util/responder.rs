use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::{Request, Response};
use serde::Serialize;
use std::io::Cursor;

/// Success envelope, `{success: true, data: T}`.
pub struct JsonResponder<T: Serialize> {
    data: T,
    status: Status,
}

impl<T: Serialize> JsonResponder<T> {
    pub fn ok(data: T) -> Self {
        JsonResponder { data, status: Status::Ok }
    }

    pub fn from(data: T, status: Status) -> Self {
        JsonResponder { data, status }
    }
}

impl<'r, T: Serialize> Responder<'r, 'static> for JsonResponder<T> {
    fn respond_to(self, _request: &'r Request<'_>) -> rocket::response::Result<'static> {
        let envelope = serde_json::json!({
            "success": true,
            "data": self.data,
        });
        let body = serde_json::to_string(&envelope).map_err(|_| Status::InternalServerError)?;

        Response::build()
            .status(self.status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}
