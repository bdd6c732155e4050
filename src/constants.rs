/// User agent string for HTTP requests
pub const USER_AGENT: &str = "mcp-ionosphere-server/0.1.0";

/// NOA grid profile service (TaD-3D and NeQuick vertical profiles)
pub const GRID_API_URL: &str = "https://electron.space.noa.gr/dias/api/v2/dias_db/odc_edensity";

/// DLR point profile service (NEDM2020)
pub const POINT_API_URL: &str = "https://impc.dlr.de/services/models/api/v1/nedm";

/// Default timeout for each upstream call, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Latitude coverage of the European grid, in degrees
pub const LATITUDE_RANGE: (f64, f64) = (34.0, 60.0);

/// Longitude coverage of the European grid, in degrees
pub const LONGITUDE_RANGE: (f64, f64) = (-5.0, 40.0);

/// Highest altitude kept in any profile, in km
pub const MAX_ALTITUDE_KM: i32 = 1000;

/// Lowest altitude kept in the NEDM2020 profile, in km
pub const NEDM_MIN_ALTITUDE_KM: i32 = 100;

/// Plasma frequency approximation: f[MHz] = 8.9803 * sqrt(Ne[10^12 m^-3])
pub const PLASMA_FREQUENCY_COEFFICIENT: f64 = 8.9803;

/// Multiplier applied to NEDM2020 densities reported in 10^12/m^3.
/// Carried over unverified; override with IONO_NEDM_DENSITY_SCALE.
pub const NEDM_DENSITY_SCALE: f64 = 1e6;

/// Solar flux used by the standalone point profile tool when none is given
pub const DEFAULT_F10_7_SFU: f64 = 100.0;

/// Altitude of the virtual receiver sent to the point profile service, in km
pub const RECEIVER_ALTITUDE_KM: f64 = 0.0;

/// Altitude of the virtual satellite sent to the point profile service, in km
pub const SATELLITE_ALTITUDE_KM: f64 = 20000.0;

/// Divisor applied to electron densities on chart axes
pub const CHART_DENSITY_DIVISOR: f64 = 1e6;
