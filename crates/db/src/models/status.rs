//! Status helper enum mapping to the `print_job_statuses` SMALLSERIAL
//! lookup table.
//!
//! Variant discriminants match the seed data order (1-based) in the
//! database table.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// All variants in seed order.
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Print job lifecycle status.
    PrintJobStatus {
        Queued = 1,
        Claimed = 2,
        Printing = 3,
        Completed = 4,
        Failed = 5,
        Cancelled = 6,
    }
}

impl PrintJobStatus {
    /// Lowercase wire name matching the lookup-table seed data.
    pub fn name(self) -> &'static str {
        parkprint_core::print_queue::state_machine::status_name(self.id())
    }

    /// Whether the status admits no further transitions.
    pub fn is_terminal(self) -> bool {
        parkprint_core::print_queue::state_machine::is_terminal(self.id())
    }

    /// Map a raw database id back to the enum, if it is a known status.
    pub fn from_id(id: StatusId) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.id() == id)
    }
}
