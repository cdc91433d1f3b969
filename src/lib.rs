/*!
# Beta Portal

Backend for a mobile app's beta-testing program, built in Rust.

## Overview

Prospective testers register through a public form and later send feedback
through a second one. Admins sign in to review both, move testers through
the `pending → approved → invited → active` pipeline, email invitations in
batches and triage feedback on kanban boards.

## Architecture

### Frontend Layer
- Static files served from `STATIC_DIR`; any unknown path falls back to
  `index.html` so client-side routing keeps working
- Talks to the backend through the JSON API below

### Backend Layer
- **Technologies**: Rust, axum, tokio
- **Core Components**:
  - Form validation - Registration and feedback forms with per-field messages
  - Dashboards - Filtering, stats, pagination and selections for testers and feedback
  - Invitation sender - Sequential batch mailing with live progress
  - Kanban boards - A persisted feedback board and a CSV-import board
  - Mail relay - `POST /api/send-email` for browser clients

### Data Persistence Layer
- `JsonStore`: one JSON file per table under `DATA_DIR`, or purely in memory
- `RestStore`: a PostgREST-style hosted backend reached over HTTP
- CSV and Excel exports built on demand, never stored

## Modules

- **config**: Environment-driven configuration
- **error**: The crate-wide `AppError`
- **models**: Testers, feedback and invitations
- **validation** / **forms**: Public form rules and submission
- **store**: The `Store` trait and its backends
- **dashboard**: Filters, stats, pagination, selections and bulk updates
- **mailer**: Email templates and transports
- **invitations**: Invitation and feedback-request batches
- **loader**: Feedback CSV import
- **kanban**: Status boards with drag and drop
- **downloader**: CSV and Excel exports
- **login**: Admin authentication and per-session workspaces
- **handlers** / **app**: HTTP endpoints, routing and startup

## REST API Endpoints

- `GET /api/test` - Health check
- `POST /api/testers` - Beta registration
- `POST /api/feedback` - Feedback form
- `POST /api/send-email` - Mail relay (only when SMTP is configured)
- `POST /api/admin/login`, `POST /api/admin/logout` - Admin session
- `/api/admin/testers/...`, `/api/admin/feedback/...` - Dashboards
- `/api/admin/invitations/...` - Invitation manager
- `/api/admin/kanban/...`, `/api/admin/importer/...` - Kanban boards
*/

pub mod config;
pub mod dashboard;
pub mod downloader;
pub mod error;
pub mod forms;
pub mod invitations;
pub mod kanban;
pub mod loader;
pub mod mailer;
pub mod models;
pub mod store;
pub mod validation;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod handlers;
#[cfg(feature = "web")]
pub mod login;

pub use config::Config;
pub use error::AppError;
