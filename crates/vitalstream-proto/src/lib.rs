//! Generated wire types for the platform's three RPC surfaces.

pub mod registry {
    pub mod v1 {
        tonic::include_proto!("registry.v1");
    }
}

pub mod anomaly {
    pub mod v1 {
        tonic::include_proto!("anomaly.v1");
    }
}

pub mod gateway {
    pub mod v1 {
        tonic::include_proto!("gateway.v1");
    }
}
