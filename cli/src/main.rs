pub mod cli;

use clap::Parser;
use tracing::error;

use booking::app::{AppState, RemoteSync};
use booking::config::AppConfig;
use booking::error::AppError;
use booking::flow::{DATE_UNAVAILABLE_MESSAGE, DateStatus, format_amount};
use booking::flow::validation::RegistrationForm;
use booking::logger::init_tracing;
use booking::model::{Booking, BookingId, Venue, VenueId};
use cli::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = AppConfig::from_env()?;
    init_tracing(cfg.json_logs);

    let app = AppState::from_config(&cfg).await?;
    if let Err(e) = app.restore_session(cli.token.clone()).await {
        error!(error = %e, "continuing without a verified session");
    }

    if let Err(e) = run(cli.command, &app).await {
        error!(error = %e, "command failed");
        anyhow::bail!(e.user_message());
    }

    Ok(())
}

async fn run(command: Command, app: &AppState) -> Result<(), AppError> {
    match command {
        Command::Venues {
            location,
            price,
            capacity,
            venue_type,
        } => {
            let filter = venue_filter(location, price, capacity, venue_type);
            let venues = app.load_venues(&filter).await?;
            if venues.is_empty() {
                println!("No venues match.");
            }
            for v in &venues {
                print_venue_line(v);
            }
        }

        Command::Venue { venue_id } => {
            let v = app.load_venue(&VenueId::new(venue_id)).await?;
            print_venue_line(&v);
            if let Some(desc) = &v.description {
                println!("  {desc}");
            }
            if !v.amenities.is_empty() {
                println!("  amenities: {}", v.amenities.join(", "));
            }
        }

        Command::Check { venue_id, date } => {
            let verdict = app.checker().check(&VenueId::new(venue_id), date).await;
            match (verdict.available, verdict.reason) {
                (true, _) => println!("{date}: available"),
                (false, Some(reason)) => println!("{date}: not available ({reason})"),
                (false, None) => println!("{date}: not available"),
            }
        }

        Command::Book {
            venue_id,
            date,
            event_type,
            guests,
            name,
            phone,
            requests,
            addons,
            payment,
        } => {
            let mut flow = app.start_booking(&VenueId::new(venue_id)).await?;

            if !flow.select_date(app.checker(), date).await? {
                let reason = match flow.date_status() {
                    DateStatus::Unavailable { reason, .. } => reason.clone(),
                    _ => DATE_UNAVAILABLE_MESSAGE.to_string(),
                };
                return Err(AppError::DateUnavailable { date, reason });
            }

            let form = flow.form_mut();
            form.event_type = Some(event_type);
            form.guest_count = guests;
            form.special_requests = requests;
            form.payment_method = payment;
            if let Some(name) = name {
                form.contact_name = name;
            }
            if let Some(phone) = phone {
                form.contact_phone = phone;
            }

            flow.advance()?;
            flow.form_mut().addons = addons_from_cli(&addons);
            flow.advance()?;

            let price = flow.price();
            println!(
                "{} on {date}: subtotal {}, tax {}, total {}",
                flow.venue().name,
                format_amount(price.subtotal),
                format_amount(price.tax),
                format_amount(price.total)
            );

            let booking = app.submit_booking(&mut flow).await?;
            println!("Booking confirmed.");
            print_booking_line(&booking);
        }

        Command::Bookings { refresh } => {
            if refresh {
                app.refresh_bookings().await?;
            }
            let bookings = app.bookings().bookings();
            if bookings.is_empty() {
                println!("No bookings.");
            }
            for b in &bookings {
                print_booking_line(b);
            }
            println!("{} confirmed", app.bookings().confirmed_count());
        }

        Command::Confirmation => match app.bookings().confirmation_booking().await {
            Some(b) => print_booking_line(&b),
            None => println!("No recent booking."),
        },

        Command::Cancel { booking_id } => {
            match app.cancel_booking(&BookingId::new(booking_id)).await? {
                RemoteSync::Synced => println!("Booking cancelled."),
                RemoteSync::Skipped => println!("Booking cancelled on this device."),
                RemoteSync::Failed(reason) => {
                    println!("Booking cancelled on this device; server not updated: {reason}")
                }
            }
        }

        Command::Reschedule { booking_id, date } => {
            app.reschedule_booking(&BookingId::new(booking_id), date)
                .await?;
            println!("Booking moved to {date}.");
        }

        Command::Login { email, password } => {
            let session = app.login(&email, &password).await?;
            println!("Signed in as {}.", session.user.name);
        }

        Command::Register {
            name,
            email,
            phone,
            password,
            confirm_password,
        } => {
            let form = RegistrationForm {
                name,
                email,
                phone,
                password,
                confirm_password,
            };
            let session = app.register(&form).await?;
            println!("Welcome, {}.", session.user.name);
        }

        Command::Logout => {
            app.logout().await;
            println!("Signed out.");
        }
    }

    Ok(())
}

fn print_venue_line(v: &Venue) {
    println!(
        "{}  {}  {}  up to {} guests  {}/day",
        v.id,
        v.name,
        v.location,
        v.capacity,
        format_amount(v.daily_rate)
    );
}

fn print_booking_line(b: &Booking) {
    println!(
        "{}  {}  {}  {}  {} guests  {}  {}",
        b.id,
        b.date,
        b.venue_name,
        b.event_type.map_or("Event", |e| e.label()),
        b.guest_count,
        format_amount(b.total_price),
        b.status
    );
}
