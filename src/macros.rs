//! Address literal macros.

/// Creates a [`GroupAddress`](crate::addressing::GroupAddress) from 3-level notation.
///
/// Components are checked at compile time.
///
/// ```
/// use knx_ip_client::ga;
///
/// let light = ga!(1/2/3);
/// assert_eq!(light.raw(), 2563);
/// ```
///
/// ```compile_fail
/// // main group is 4 bits wide
/// let addr = knx_ip_client::ga!(16/0/0);
/// ```
///
/// ```compile_fail
/// let addr = knx_ip_client::ga!(1/8/0);
/// ```
#[macro_export]
macro_rules! ga {
    ($main:literal / $middle:literal / $sub:literal) => {{
        const _: () = {
            if $main > 15 {
                panic!("Main group must be 0-15");
            }
            if $middle > 7 {
                panic!("Middle group must be 0-7");
            }
            if $sub > 255 {
                panic!("Sub group must be 0-255");
            }
        };
        $crate::addressing::GroupAddress::from_parts($main, $middle, $sub)
    }};
}

/// Creates an [`IndividualAddress`](crate::addressing::IndividualAddress) from
/// its `area, line, device` components.
///
/// ```
/// use knx_ip_client::ia;
///
/// let me = ia!(1, 1, 250);
/// assert_eq!(me.to_string(), "1.1.250");
/// ```
#[macro_export]
macro_rules! ia {
    ($area:literal, $line:literal, $device:literal) => {{
        const _: () = {
            if $area > 15 {
                panic!("Area must be 0-15");
            }
            if $line > 15 {
                panic!("Line must be 0-15");
            }
            if $device > 255 {
                panic!("Device must be 0-255");
            }
        };
        $crate::addressing::IndividualAddress::from_parts($area, $line, $device)
    }};
}
