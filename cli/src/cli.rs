use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use booking::model::{Addons, EventType, PaymentMethod, RangeFilter, VenueFilter};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AddonCli {
    Decoration,
    Catering,
    Equipment,
}

#[derive(Debug, Parser)]
#[clap(name = "venue-booking", version)]
pub struct Cli {
    /// Session token; overrides the one saved on this device by `login`
    #[clap(long, env = "BOOKING_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List venues, optionally filtered
    Venues {
        #[clap(long)]
        location: Option<String>,

        /// Daily rate range, e.g. `10000-50000` or `100000` (and above)
        #[clap(long, value_parser = parse_range)]
        price: Option<RangeFilter>,

        /// Capacity range, e.g. `50-200`
        #[clap(long, value_parser = parse_range)]
        capacity: Option<RangeFilter>,

        #[clap(long = "type")]
        venue_type: Option<String>,
    },

    /// Show one venue
    Venue { venue_id: String },

    /// Check whether a venue is free on a day (YYYY-MM-DD)
    Check { venue_id: String, date: NaiveDate },

    /// Book a venue for one day
    Book {
        venue_id: String,

        #[clap(long)]
        date: NaiveDate,

        #[clap(long)]
        event_type: EventType,

        #[clap(long, default_value_t = 1)]
        guests: u32,

        /// Defaults to the signed-in user's name
        #[clap(long)]
        name: Option<String>,

        /// Defaults to the signed-in user's phone
        #[clap(long)]
        phone: Option<String>,

        #[clap(long, default_value = "")]
        requests: String,

        #[clap(long, value_enum, value_delimiter = ',')]
        addons: Vec<AddonCli>,

        #[clap(long, default_value = "credit_card")]
        payment: PaymentMethod,
    },

    /// List bookings of the active user
    Bookings {
        /// Fetch the server's list before printing
        #[clap(long)]
        refresh: bool,
    },

    /// Show the most recent booking confirmation
    Confirmation,

    Cancel { booking_id: String },

    Reschedule { booking_id: String, date: NaiveDate },

    Login {
        #[clap(long)]
        email: String,

        #[clap(long, env = "BOOKING_PASSWORD", hide_env_values = true)]
        password: String,
    },

    Register {
        #[clap(long)]
        name: String,

        #[clap(long)]
        email: String,

        #[clap(long)]
        phone: String,

        #[clap(long, env = "BOOKING_PASSWORD", hide_env_values = true)]
        password: String,

        #[clap(long)]
        confirm_password: String,
    },

    Logout,
}

fn parse_range(raw: &str) -> Result<RangeFilter, String> {
    RangeFilter::parse(raw).ok_or_else(|| format!("invalid range: {raw}"))
}

pub(crate) fn addons_from_cli(selected: &[AddonCli]) -> Addons {
    let mut addons = Addons::NONE;
    for a in selected {
        match a {
            AddonCli::Decoration => addons.decoration = true,
            AddonCli::Catering => addons.catering = true,
            AddonCli::Equipment => addons.equipment = true,
        }
    }
    addons
}

pub(crate) fn venue_filter(
    location: Option<String>,
    price: Option<RangeFilter>,
    capacity: Option<RangeFilter>,
    venue_type: Option<String>,
) -> VenueFilter {
    VenueFilter {
        location,
        price,
        capacity,
        venue_type,
    }
}
