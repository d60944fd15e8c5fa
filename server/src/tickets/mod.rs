pub mod document;
pub mod issuer;

pub use document::{load_logo, render_ticket, TicketDetails};
pub use issuer::{generate_token, register, ticket_pdf, ticket_view, TOKEN_LENGTH};
