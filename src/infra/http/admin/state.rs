use crate::application::settings::ConfigService;

#[derive(Clone)]
pub struct AdminState {
    pub config: ConfigService,
}
