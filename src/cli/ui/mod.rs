mod device_view;
mod diagnosis_view;
mod info_view;
mod notification_view;
mod painter;
mod spinner;
mod table;

pub(crate) use self::device_view::{DeviceListView, DeviceView};
pub(crate) use self::diagnosis_view::DiagnosisView;
pub(crate) use self::info_view::DeviceInfoView;
pub(crate) use self::notification_view::NotificationsView;
pub(crate) use self::painter::Painter;
pub(crate) use self::spinner::Spinner;
pub(crate) use self::table::Table;
