//! The closed set of resource kinds a handle can resolve to.

use crate::access::AccessFacade;
use crate::download::DownloadFacade;
use crate::listing::ObjectIteratorFacade;
use crate::project::ProjectFacade;
use crate::upload::UploadFacade;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) enum Resource {
    Access(Arc<AccessFacade>),
    Project(Arc<ProjectFacade>),
    Upload(Arc<UploadFacade>),
    Download(Arc<DownloadFacade>),
    ObjectIterator(Arc<ObjectIteratorFacade>),
}

impl Resource {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Resource::Access(_) => AccessFacade::KIND,
            Resource::Project(_) => ProjectFacade::KIND,
            Resource::Upload(_) => UploadFacade::KIND,
            Resource::Download(_) => DownloadFacade::KIND,
            Resource::ObjectIterator(_) => ObjectIteratorFacade::KIND,
        }
    }
}

/// Typed view of one [`Resource`] variant.
pub(crate) trait Facade: Sized {
    /// Reported in `InvalidHandle` errors.
    const KIND: &'static str;

    fn from_resource(resource: &Resource) -> Option<Arc<Self>>;
    fn into_resource(self: Arc<Self>) -> Resource;
}

macro_rules! facade {
    ($($variant:ident => $ty:ty, $kind:literal;)*) => {
        $(
            impl Facade for $ty {
                const KIND: &'static str = $kind;

                fn from_resource(resource: &Resource) -> Option<Arc<Self>> {
                    match resource {
                        Resource::$variant(inner) => Some(Arc::clone(inner)),
                        _ => None,
                    }
                }

                fn into_resource(self: Arc<Self>) -> Resource {
                    Resource::$variant(self)
                }
            }
        )*
    };
}

facade! {
    Access => AccessFacade, "access";
    Project => ProjectFacade, "project";
    Upload => UploadFacade, "upload";
    Download => DownloadFacade, "download";
    ObjectIterator => ObjectIteratorFacade, "object iterator";
}
